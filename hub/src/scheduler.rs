//! Scheduler: per-environment scheduled-task CRUD. Deliberately thin: the spec's own
//! Non-goals treat "scheduling (auto-assignment)" as a thin CRUD layer
//! over the core, so this holds schedule definitions and a failure log
//! without itself firing a cron dispatcher — wiring a scheduled task's
//! cron expression to an actual timer is out of this core's scope.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use task_daemon_core::models::NewTask;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: String,
    pub cron_expression: String,
    pub task_template: NewTask,
    pub paused: bool,
    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure_log: Vec<ScheduleFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleFailure {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Validates a 5-field cron expression (`minute hour day-of-month month
/// day-of-week`) shape without interpreting it; a wildcard, a bare
/// number, a comma list, or a `*/N` step is accepted in each field.
pub fn validate_cron(expr: &str) -> Result<(), String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 fields, got {}", fields.len()));
    }
    for field in fields {
        let valid = field == "*"
            || field.split(',').all(|part| {
                part == "*"
                    || part.parse::<u32>().is_ok()
                    || part.starts_with("*/") && part[2..].parse::<u32>().is_ok()
                    || part.contains('-') && part.split('-').all(|b| b.parse::<u32>().is_ok())
            });
        if !valid {
            return Err(format!("invalid cron field: {field}"));
        }
    }
    Ok(())
}

pub struct Scheduler {
    tasks: RwLock<HashMap<String, ScheduledTask>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler { tasks: RwLock::new(HashMap::new()) }
    }

    pub async fn create(&self, cron_expression: String, task_template: NewTask) -> Result<ScheduledTask, String> {
        validate_cron(&cron_expression)?;
        let task = ScheduledTask {
            id: Uuid::new_v4().to_string(),
            cron_expression,
            task_template,
            paused: false,
            created_at: Utc::now(),
            last_run: None,
            failure_log: Vec::new(),
        };
        self.tasks.write().await.insert(task.id.clone(), task.clone());
        Ok(task)
    }

    pub async fn get(&self, id: &str) -> Option<ScheduledTask> {
        self.tasks.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<ScheduledTask> {
        self.tasks.read().await.values().cloned().collect()
    }

    pub async fn update_cron(&self, id: &str, cron_expression: String) -> Result<ScheduledTask, String> {
        validate_cron(&cron_expression)?;
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(id).ok_or_else(|| format!("unknown scheduled task: {id}"))?;
        task.cron_expression = cron_expression;
        Ok(task.clone())
    }

    pub async fn delete(&self, id: &str) -> bool {
        self.tasks.write().await.remove(id).is_some()
    }

    pub async fn pause(&self, id: &str) -> bool {
        self.set_paused(id, true).await
    }

    pub async fn resume(&self, id: &str) -> bool {
        self.set_paused(id, false).await
    }

    async fn set_paused(&self, id: &str, paused: bool) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(id) {
            Some(task) => {
                task.paused = paused;
                true
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, id: &str, message: String) -> bool {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(id) {
            Some(task) => {
                task.failure_log.push(ScheduleFailure { at: Utc::now(), message });
                true
            }
            None => false,
        }
    }

    /// A deterministic ordering for "order optimization": paused
    /// schedules last, otherwise earliest-created first.
    pub async fn optimized_order(&self) -> Vec<ScheduledTask> {
        let mut tasks: Vec<ScheduledTask> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| a.paused.cmp(&b.paused).then(a.created_at.cmp(&b.created_at)));
        tasks
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedScheduler = Arc<Scheduler>;

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> NewTask {
        NewTask { title: "scheduled".to_string(), ..Default::default() }
    }

    #[test]
    fn cron_validation_accepts_wildcards_and_steps() {
        assert!(validate_cron("* * * * *").is_ok());
        assert!(validate_cron("*/5 * * * *").is_ok());
        assert!(validate_cron("0 9 * * 1-5").is_ok());
    }

    #[test]
    fn cron_validation_rejects_wrong_field_count() {
        assert!(validate_cron("* * * *").is_err());
    }

    #[tokio::test]
    async fn create_rejects_invalid_cron() {
        let scheduler = Scheduler::new();
        let result = scheduler.create("bogus".to_string(), template()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn pause_resume_round_trip() {
        let scheduler = Scheduler::new();
        let task = scheduler.create("0 * * * *".to_string(), template()).await.unwrap();
        assert!(scheduler.pause(&task.id).await);
        assert!(scheduler.get(&task.id).await.unwrap().paused);
        assert!(scheduler.resume(&task.id).await);
        assert!(!scheduler.get(&task.id).await.unwrap().paused);
    }

    #[tokio::test]
    async fn optimized_order_puts_paused_last() {
        let scheduler = Scheduler::new();
        let a = scheduler.create("0 * * * *".to_string(), template()).await.unwrap();
        let b = scheduler.create("0 * * * *".to_string(), template()).await.unwrap();
        scheduler.pause(&a.id).await;
        let order = scheduler.optimized_order().await;
        assert_eq!(order[0].id, b.id);
        assert_eq!(order[1].id, a.id);
    }
}
