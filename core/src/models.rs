//! Core domain types: [`Task`] and the value types around it.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `todo | in-progress | done | invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Invalid,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Invalid => "invalid",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = crate::error::TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "invalid" => Ok(TaskStatus::Invalid),
            other => Err(crate::error::TaskError::validation(format!(
                "unknown task status: {other}"
            ))),
        }
    }
}

/// `low | medium | high`, ordered low-to-high for the Dependency Engine's
/// tie-break comparisons (`high > medium > low`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(crate::error::TaskError::validation(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Feature,
    Story,
    Task,
    Implementation,
    Integration,
    Testing,
    Research,
}

impl Default for TaskType {
    fn default() -> Self {
        TaskType::Task
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::Feature => "feature",
            TaskType::Story => "story",
            TaskType::Task => "task",
            TaskType::Implementation => "implementation",
            TaskType::Integration => "integration",
            TaskType::Testing => "testing",
            TaskType::Research => "research",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskType {
    type Err = crate::error::TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(TaskType::Feature),
            "story" => Ok(TaskType::Story),
            "task" => Ok(TaskType::Task),
            "implementation" => Ok(TaskType::Implementation),
            "integration" => Ok(TaskType::Integration),
            "testing" => Ok(TaskType::Testing),
            "research" => Ok(TaskType::Research),
            other => Err(crate::error::TaskError::validation(format!(
                "unknown task type: {other}"
            ))),
        }
    }
}

/// One entry in a [`Task`]'s append-only `action_log`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Action log entries past this count are dropped from the front; a
/// long-lived daemon process never restarts, so the log needs a ceiling
/// independent of any spec invariant.
pub const MAX_ACTION_LOG_ENTRIES: usize = 10_000;

/// The core persistent entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub dependencies: BTreeSet<String>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub collaborators: BTreeSet<String>,
    pub watchers: BTreeSet<String>,
    pub action_log: Vec<ActionLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Builds a new Task from a [`NewTask`] request, stamping id and
    /// timestamps. Does not validate; callers run the Dependency Engine and
    /// [`crate::validation::TaskValidator`] first.
    pub fn from_new(new: NewTask, now: DateTime<Utc>) -> Self {
        let id = format!(
            "{}-{}",
            now.timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        Task {
            id,
            title: new.title,
            description: new.description.unwrap_or_default(),
            status: TaskStatus::Todo,
            priority: new.priority.unwrap_or_default(),
            task_type: new.task_type.unwrap_or_default(),
            dependencies: new.dependencies.unwrap_or_default(),
            created_by: new.created_by.unwrap_or_else(|| "system".to_string()),
            assigned_to: new.assigned_to,
            collaborators: new.collaborators.unwrap_or_default(),
            watchers: new.watchers.unwrap_or_default(),
            action_log: vec![ActionLogEntry {
                action: "created".to_string(),
                timestamp: now,
                user_id: "system".to_string(),
                details: None,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a log entry, trimming the oldest entries once
    /// [`MAX_ACTION_LOG_ENTRIES`] is exceeded, and refreshes `updated_at`.
    pub fn record(
        &mut self,
        action: impl Into<String>,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
        details: Option<serde_json::Value>,
    ) {
        self.action_log.push(ActionLogEntry {
            action: action.into(),
            timestamp: now,
            user_id: user_id.into(),
            details,
        });
        if self.action_log.len() > MAX_ACTION_LOG_ENTRIES {
            let overflow = self.action_log.len() - MAX_ACTION_LOG_ENTRIES;
            self.action_log.drain(0..overflow);
        }
        self.updated_at = now;
    }
}

/// Request to create a new Task. Mirrors [`Task`]'s optional inputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub dependencies: Option<BTreeSet<String>>,
    pub created_by: Option<String>,
    pub assigned_to: Option<String>,
    pub collaborators: Option<BTreeSet<String>>,
    pub watchers: Option<BTreeSet<String>>,
}

/// Partial update; every field is optional and only present fields are
/// applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub dependencies: Option<BTreeSet<String>>,
    pub assigned_to: Option<String>,
    pub collaborators: Option<BTreeSet<String>>,
    pub watchers: Option<BTreeSet<String>>,
}

/// Filters accepted by `list_tasks` / the Store's `scan`-with-filter path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub assigned_to: Option<String>,
    pub created_by: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if task.priority != priority {
                return false;
            }
        }
        if let Some(task_type) = self.task_type {
            if task.task_type != task_type {
                return false;
            }
        }
        if let Some(ref assigned_to) = self.assigned_to {
            if task.assigned_to.as_deref() != Some(assigned_to.as_str()) {
                return false;
            }
        }
        if let Some(ref created_by) = self.created_by {
            if &task.created_by != created_by {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_display_and_from_str() {
        for s in [
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::Done,
            TaskStatus::Invalid,
        ] {
            let parsed: TaskStatus = s.to_string().parse().unwrap();
            assert_eq!(parsed, s);
        }
    }

    #[test]
    fn priority_ordering_is_high_over_medium_over_low() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn new_task_defaults_created_by_to_system() {
        let now = Utc::now();
        let task = Task::from_new(
            NewTask {
                title: "A".to_string(),
                ..Default::default()
            },
            now,
        );
        assert_eq!(task.created_by, "system");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.created_at, task.updated_at);
        assert_eq!(task.action_log.len(), 1);
    }

    #[test]
    fn duplicate_dependency_ids_collapse_via_btreeset() {
        let mut deps = BTreeSet::new();
        deps.insert("a".to_string());
        deps.insert("a".to_string());
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn filter_matches_on_all_present_fields() {
        let now = Utc::now();
        let task = Task::from_new(
            NewTask {
                title: "A".to_string(),
                priority: Some(Priority::High),
                ..Default::default()
            },
            now,
        );
        let filter = TaskFilter {
            priority: Some(Priority::High),
            ..Default::default()
        };
        assert!(filter.matches(&task));
        let filter_no_match = TaskFilter {
            priority: Some(Priority::Low),
            ..Default::default()
        };
        assert!(!filter_no_match.matches(&task));
    }
}
