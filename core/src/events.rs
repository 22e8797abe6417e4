//! The ten event kinds published on the Event Bus and fanned out by the
//! WebSocket Broadcaster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskStatusChanged,
    TaskPriorityChanged,
    TaskAssigned,
    TaskCollaboratorsUpdated,
    TaskWatchersUpdated,
    TasksList,
    TaskStatusNotification,
}

impl EventKind {
    /// The five primary task events a freshly connected WebSocket client
    /// is subscribed to by default.
    pub fn default_subscriptions() -> [EventKind; 5] {
        [
            EventKind::TaskCreated,
            EventKind::TaskUpdated,
            EventKind::TaskDeleted,
            EventKind::TaskStatusChanged,
            EventKind::TaskPriorityChanged,
        ]
    }
}

/// `{ type, timestamp, data }` envelope published on the Event Bus and
/// broadcast to WebSocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, timestamp: DateTime<Utc>, data: serde_json::Value) -> Self {
        Event { kind, timestamp, data }
    }

    pub fn task_created(task: &Task, now: DateTime<Utc>) -> Self {
        Event::new(EventKind::TaskCreated, now, serde_json::json!({ "task": task }))
    }

    pub fn task_updated(task: &Task, now: DateTime<Utc>) -> Self {
        Event::new(EventKind::TaskUpdated, now, serde_json::json!({ "task": task }))
    }

    pub fn task_deleted(task_id: &str, now: DateTime<Utc>) -> Self {
        Event::new(
            EventKind::TaskDeleted,
            now,
            serde_json::json!({ "taskId": task_id }),
        )
    }

    pub fn task_status_changed(task: &Task, old_status: &str, now: DateTime<Utc>) -> Self {
        Event::new(
            EventKind::TaskStatusChanged,
            now,
            serde_json::json!({
                "task": task,
                "oldStatus": old_status,
                "newStatus": task.status.to_string(),
            }),
        )
    }

    pub fn task_priority_changed(task: &Task, old_priority: &str, now: DateTime<Utc>) -> Self {
        Event::new(
            EventKind::TaskPriorityChanged,
            now,
            serde_json::json!({
                "task": task,
                "oldPriority": old_priority,
                "newPriority": task.priority.to_string(),
            }),
        )
    }

    pub fn tasks_list(tasks: &[Task], now: DateTime<Utc>) -> Self {
        Event::new(EventKind::TasksList, now, serde_json::json!({ "tasks": tasks }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_subscriptions_cover_the_five_primary_task_events() {
        let defaults = EventKind::default_subscriptions();
        assert!(defaults.contains(&EventKind::TaskCreated));
        assert!(defaults.contains(&EventKind::TaskPriorityChanged));
        assert!(!defaults.contains(&EventKind::TasksList));
    }
}
