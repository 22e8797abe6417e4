//! Audit Log verbs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use task_daemon_core::audit::{AuditEventKind, AuditFilter};

use super::{Command, DispatchContext};
use crate::error::{HubError, Result};
use crate::registry::EnvServices;

#[derive(Deserialize, Default)]
struct HistoryParams {
    #[serde(rename = "taskId")]
    task_id: Option<String>,
    actor: Option<String>,
    kind: Option<AuditEventKind>,
    since: Option<chrono::DateTime<Utc>>,
    until: Option<chrono::DateTime<Utc>>,
}

impl From<HistoryParams> for AuditFilter {
    fn from(p: HistoryParams) -> Self {
        AuditFilter { task_id: p.task_id, actor: p.actor, kind: p.kind, since: p.since, until: p.until }
    }
}

pub struct History;
#[async_trait]
impl Command for History {
    fn name(&self) -> &'static str {
        "audit_history"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: HistoryParams = if data.is_null() { HistoryParams::default() } else { serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))? };
        let events = services.audit.query(&params.into()).await?;
        Ok(serde_json::to_value(events).unwrap())
    }
}

/// `audit_summary`: counts per event kind over the full log.
pub struct Summary;
#[async_trait]
impl Command for Summary {
    fn name(&self) -> &'static str {
        "audit_summary"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let events = services.audit.query(&AuditFilter::default()).await?;
        let mut by_kind: HashMap<String, u64> = HashMap::new();
        for event in &events {
            *by_kind.entry(format!("{:?}", event.kind)).or_insert(0) += 1;
        }
        Ok(serde_json::json!({ "total": events.len(), "byKind": by_kind }))
    }
}

/// `audit_statistics`: per-actor event counts alongside the kind summary.
pub struct Statistics;
#[async_trait]
impl Command for Statistics {
    fn name(&self) -> &'static str {
        "audit_statistics"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let events = services.audit.query(&AuditFilter::default()).await?;
        let mut by_actor: HashMap<String, u64> = HashMap::new();
        let mut by_kind: HashMap<String, u64> = HashMap::new();
        for event in &events {
            *by_actor.entry(event.actor.clone()).or_insert(0) += 1;
            *by_kind.entry(format!("{:?}", event.kind)).or_insert(0) += 1;
        }
        Ok(serde_json::json!({ "total": events.len(), "byActor": by_actor, "byKind": by_kind }))
    }
}

#[derive(Deserialize)]
struct PruneParams {
    #[serde(rename = "olderThanDays")]
    older_than_days: i64,
}

/// `audit_prune`: removes entries older than the given number of days
pub struct Prune;
#[async_trait]
impl Command for Prune {
    fn name(&self) -> &'static str {
        "audit_prune"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: PruneParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let removed = services.audit.prune(Utc::now(), chrono::Duration::days(params.older_than_days)).await?;
        Ok(serde_json::json!({ "removed": removed }))
    }
}
