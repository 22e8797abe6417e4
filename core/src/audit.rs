//! Audit Log types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Created,
    Updated,
    StatusChanged,
    PriorityChanged,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub task_id: String,
    pub kind: AuditEventKind,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub payload: serde_json::Value,
}

/// Filters accepted by [`AuditLog::query`].
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub task_id: Option<String>,
    pub actor: Option<String>,
    pub kind: Option<AuditEventKind>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(ref task_id) = self.task_id {
            if &event.task_id != task_id {
                return false;
            }
        }
        if let Some(ref actor) = self.actor {
            if &event.actor != actor {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if event.kind != kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.at > until {
                return false;
            }
        }
        true
    }
}

/// Append-only per-environment event journal. A failed
/// `record` call is logged by the caller and must never roll back the
/// Store write that preceded it.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>>;

    /// Removes entries older than `older_than`, measured from `now`.
    /// Callers supply the retention window explicitly; `AuditLog` itself
    /// has no baked-in default (see DESIGN.md "Audit retention default").
    async fn prune(&self, now: DateTime<Utc>, older_than: chrono::Duration) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_on_kind_and_task_id() {
        let event = AuditEvent {
            id: "1".to_string(),
            task_id: "t1".to_string(),
            kind: AuditEventKind::StatusChanged,
            at: Utc::now(),
            actor: "system".to_string(),
            payload: serde_json::json!({}),
        };
        let filter = AuditFilter {
            task_id: Some("t1".to_string()),
            kind: Some(AuditEventKind::StatusChanged),
            ..Default::default()
        };
        assert!(filter.matches(&event));
        let non_match = AuditFilter {
            kind: Some(AuditEventKind::Deleted),
            ..Default::default()
        };
        assert!(!non_match.matches(&event));
    }
}
