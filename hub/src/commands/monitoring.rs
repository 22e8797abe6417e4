//! Monitoring-session verbs, backed by the per-environment
//! [`crate::monitor::TaskMonitor`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{Command, DispatchContext};
use crate::error::{HubError, Result};
use crate::registry::EnvServices;

#[derive(Deserialize)]
struct TaskIds {
    #[serde(rename = "taskIds")]
    task_ids: HashSet<String>,
}

/// `subscribe_to_task_notifications`: creates a monitoring session for the
/// given task id set. TCP mirroring back to the requesting socket is
/// arranged by the TCP connection handler, which supplies its own sender
/// half when it calls [`crate::monitor::TaskMonitor::create`] directly;
/// this command variant is the non-mirroring path used over HTTP/WS
pub struct SubscribeToTaskNotifications;
#[async_trait]
impl Command for SubscribeToTaskNotifications {
    fn name(&self) -> &'static str {
        "subscribe_to_task_notifications"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: TaskIds = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let id = services.monitor.create(params.task_ids, None).await;
        Ok(serde_json::json!({ "sessionId": id }))
    }
}

pub struct CreateSession;
#[async_trait]
impl Command for CreateSession {
    fn name(&self) -> &'static str {
        "monitoring_session_create"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: TaskIds = if data.is_null() {
            TaskIds { task_ids: HashSet::new() }
        } else {
            serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?
        };
        let id = services.monitor.create(params.task_ids, None).await;
        Ok(serde_json::json!({ "sessionId": id }))
    }
}

#[derive(Deserialize)]
struct UpdateParams {
    id: String,
    #[serde(rename = "taskIds")]
    task_ids: HashSet<String>,
}

pub struct UpdateSession;
#[async_trait]
impl Command for UpdateSession {
    fn name(&self) -> &'static str {
        "monitoring_session_update"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: UpdateParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let updated = services.monitor.update(&params.id, params.task_ids).await;
        Ok(serde_json::json!({ "updated": updated }))
    }
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

fn session_id(data: &Value) -> Result<String> {
    serde_json::from_value::<IdOnly>(data.clone()).map(|v| v.id).map_err(|e| HubError::MalformedRequest(e.to_string()))
}

pub struct GetSession;
#[async_trait]
impl Command for GetSession {
    fn name(&self) -> &'static str {
        "monitoring_session_get"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = session_id(&data)?;
        let session = services.monitor.get(&id).await.ok_or_else(|| HubError::MalformedRequest(format!("unknown monitoring session: {id}")))?;
        Ok(serde_json::to_value(session).unwrap())
    }
}

pub struct ListSessions;
#[async_trait]
impl Command for ListSessions {
    fn name(&self) -> &'static str {
        "monitoring_session_list"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        Ok(serde_json::to_value(services.monitor.list().await).unwrap())
    }
}

pub struct CloseSession;
#[async_trait]
impl Command for CloseSession {
    fn name(&self) -> &'static str {
        "monitoring_session_close"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = session_id(&data)?;
        Ok(serde_json::json!({ "closed": services.monitor.close(&id).await }))
    }
}

/// `monitoring_session_tasks`: the current Task set filtered down to a
/// session's watched ids.
pub struct SessionTasks;
#[async_trait]
impl Command for SessionTasks {
    fn name(&self) -> &'static str {
        "monitoring_session_tasks"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = session_id(&data)?;
        let session = services.monitor.get(&id).await.ok_or_else(|| HubError::MalformedRequest(format!("unknown monitoring session: {id}")))?;
        let all = services.store.scan().await?;
        let scoped: Vec<_> = all.into_iter().filter(|t| session.task_ids.contains(&t.id)).collect();
        Ok(serde_json::to_value(scoped).unwrap())
    }
}
