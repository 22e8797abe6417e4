//! Task Monitor: server-side monitoring sessions.
//! Backs the `subscribe_to_task_notifications` command and the
//! monitoring/session verb group.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use task_daemon_core::events::Event;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// One client's notification subscription: the task ids it cares about
/// and, optionally, a channel back to the TCP connection that requested
/// mirroring.
pub struct MonitoringSession {
    pub id: String,
    pub task_ids: HashSet<String>,
    pub created_at: DateTime<Utc>,
    mirror: Option<mpsc::UnboundedSender<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSessionSummary {
    pub id: String,
    pub task_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&MonitoringSession> for MonitoringSessionSummary {
    fn from(s: &MonitoringSession) -> Self {
        MonitoringSessionSummary {
            id: s.id.clone(),
            task_ids: s.task_ids.iter().cloned().collect(),
            created_at: s.created_at,
        }
    }
}

/// Per-environment registry of monitoring sessions.
pub struct TaskMonitor {
    sessions: RwLock<HashMap<String, MonitoringSession>>,
}

impl TaskMonitor {
    pub fn new() -> Self {
        TaskMonitor { sessions: RwLock::new(HashMap::new()) }
    }

    pub async fn create(
        &self,
        task_ids: HashSet<String>,
        mirror: Option<mpsc::UnboundedSender<String>>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let session = MonitoringSession { id: id.clone(), task_ids, created_at: Utc::now(), mirror };
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    pub async fn update(&self, id: &str, task_ids: HashSet<String>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.task_ids = task_ids;
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, id: &str) -> Option<MonitoringSessionSummary> {
        self.sessions.read().await.get(id).map(MonitoringSessionSummary::from)
    }

    pub async fn list(&self) -> Vec<MonitoringSessionSummary> {
        self.sessions.read().await.values().map(MonitoringSessionSummary::from).collect()
    }

    pub async fn close(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Mirrors `event` to every session subscribed to `task_id` that
    /// requested TCP fan-out. Called from the event-bus forwarding loop.
    pub async fn notify(&self, task_id: &str, event: &Event) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(_) => return,
        };
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            if session.task_ids.contains(task_id) {
                if let Some(mirror) = &session.mirror {
                    let _ = mirror.send(payload.clone());
                }
            }
        }
    }
}

impl Default for TaskMonitor {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedTaskMonitor = Arc<TaskMonitor>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_update_close_round_trip() {
        let monitor = TaskMonitor::new();
        let id = monitor.create(HashSet::from(["t1".to_string()]), None).await;

        let summary = monitor.get(&id).await.unwrap();
        assert_eq!(summary.task_ids, vec!["t1".to_string()]);

        let updated = monitor.update(&id, HashSet::from(["t2".to_string()])).await;
        assert!(updated);
        assert_eq!(monitor.get(&id).await.unwrap().task_ids, vec!["t2".to_string()]);

        assert!(monitor.close(&id).await);
        assert!(monitor.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn update_on_unknown_session_returns_false() {
        let monitor = TaskMonitor::new();
        assert!(!monitor.update("missing", HashSet::new()).await);
    }
}
