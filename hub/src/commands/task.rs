//! Task CRUD verbs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use task_daemon_core::audit::{AuditEvent, AuditEventKind};
use task_daemon_core::events::Event;
use task_daemon_core::graph;
use task_daemon_core::models::{NewTask, Priority, Task, TaskFilter, TaskStatus, UpdateTask};
use task_daemon_core::repository::StoreExt;
use tracing::warn;
use uuid::Uuid;

use super::{Command, DispatchContext};
use crate::error::{HubError, Result};
use crate::registry::EnvServices;

/// Records an audit event, logging (never failing the command) on error —
/// a deliberate weakening: a lost audit record never rolls back a
/// successful Store write.
async fn record_audit(services: &EnvServices, task_id: &str, kind: AuditEventKind, actor: &str, payload: Value) {
    let event = AuditEvent { id: Uuid::new_v4().to_string(), task_id: task_id.to_string(), kind, at: Utc::now(), actor: actor.to_string(), payload };
    if let Err(e) = services.audit.record(event).await {
        warn!(task_id, error = %e, "audit write failed; store write stands");
    }
}

pub struct CreateTask;
#[async_trait]
impl Command for CreateTask {
    fn name(&self) -> &'static str {
        "create_task"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let new_task: NewTask = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        task_daemon_core::validation::TaskValidator::validate_new_task(&new_task)?;

        // Self-dependency, dependency-missing, and cycle checks happen
        // inside the Store implementation itself; a
        // freshly created task cannot yet be the target of any edge, so
        // there is nothing left for the command layer to pre-check.
        let now = Utc::now();
        let created = services.store.create(new_task).await?;
        record_audit(services, &created.id, AuditEventKind::Created, &created.created_by, serde_json::json!({ "task": created })).await;
        services.event_bus.publish(Event::task_created(&created, now));
        Ok(serde_json::to_value(created).unwrap())
    }
}

pub struct ListTasks;
#[async_trait]
impl Command for ListTasks {
    fn name(&self) -> &'static str {
        "list_tasks"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let filter: TaskFilter = if data.is_null() { TaskFilter::default() } else { serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))? };
        let tasks = services.store.list(&filter).await?;
        services.event_bus.publish(Event::tasks_list(&tasks, Utc::now()));
        Ok(serde_json::to_value(tasks).unwrap())
    }
}

pub struct GetTask;
#[async_trait]
impl Command for GetTask {
    fn name(&self) -> &'static str {
        "get_task"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = task_id(&data)?;
        let task = services.store.get(&id).await?;
        Ok(serde_json::to_value(task).unwrap())
    }
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

fn task_id(data: &Value) -> Result<String> {
    serde_json::from_value::<IdOnly>(data.clone())
        .map(|v| v.id)
        .map_err(|e| HubError::MalformedRequest(e.to_string()))
}

#[derive(Deserialize)]
struct UpdateStatusParams {
    id: String,
    status: TaskStatus,
    #[serde(default = "default_actor")]
    actor: String,
}

#[derive(Deserialize)]
struct UpdatePriorityParams {
    id: String,
    priority: Priority,
    #[serde(default = "default_actor")]
    actor: String,
}

fn default_actor() -> String {
    "system".to_string()
}

pub struct UpdateTaskStatus;
#[async_trait]
impl Command for UpdateTaskStatus {
    fn name(&self) -> &'static str {
        "update_task_status"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: UpdateStatusParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let mut task = services.store.get(&params.id).await?;
        let old_status = task.status.to_string();
        let now = Utc::now();
        task.status = params.status;
        task.record("status_changed", &params.actor, now, Some(serde_json::json!({ "from": old_status, "to": task.status.to_string() })));
        let updated = services.store.put(task).await?;

        record_audit(services, &updated.id, AuditEventKind::StatusChanged, &params.actor, serde_json::json!({ "from": old_status, "to": updated.status.to_string() })).await;
        services.event_bus.publish(Event::task_status_changed(&updated, &old_status, now));
        services.event_bus.publish(Event::new(
            task_daemon_core::events::EventKind::TaskStatusNotification,
            now,
            serde_json::json!({ "taskId": updated.id, "status": updated.status.to_string() }),
        ));
        Ok(serde_json::to_value(updated).unwrap())
    }
}

pub struct UpdateTaskPriority;
#[async_trait]
impl Command for UpdateTaskPriority {
    fn name(&self) -> &'static str {
        "update_task_priority"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: UpdatePriorityParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let mut task = services.store.get(&params.id).await?;
        let old_priority = task.priority.to_string();
        let now = Utc::now();
        task.priority = params.priority;
        task.record("priority_changed", &params.actor, now, Some(serde_json::json!({ "from": old_priority, "to": task.priority.to_string() })));
        let updated = services.store.put(task).await?;

        record_audit(services, &updated.id, AuditEventKind::PriorityChanged, &params.actor, serde_json::json!({ "from": old_priority, "to": updated.priority.to_string() })).await;
        services.event_bus.publish(Event::task_priority_changed(&updated, &old_priority, now));
        Ok(serde_json::to_value(updated).unwrap())
    }
}

#[derive(Deserialize)]
struct UpdateTaskParams {
    id: String,
    #[serde(flatten)]
    update: UpdateTask,
    #[serde(default = "default_actor")]
    actor: String,
}

pub struct UpdateTask;
#[async_trait]
impl Command for UpdateTask {
    fn name(&self) -> &'static str {
        "update_task"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: UpdateTaskParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let now = Utc::now();

        if params.update.dependencies.is_some() {
            let mut all = services.store.scan().await?;
            if let Some(existing) = all.iter_mut().find(|t| t.id == params.id) {
                existing.dependencies = params.update.dependencies.clone().unwrap();
            }
            graph::check_write_would_cycle(&all)?;
        }

        let updated = services.store.apply_update(&params.id, params.update, now).await?;
        record_audit(services, &updated.id, AuditEventKind::Updated, &params.actor, serde_json::json!({ "task": updated })).await;
        services.event_bus.publish(Event::task_updated(&updated, now));
        Ok(serde_json::to_value(updated).unwrap())
    }
}

pub struct DeleteTask;
#[async_trait]
impl Command for DeleteTask {
    fn name(&self) -> &'static str {
        "delete_task"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = task_id(&data)?;
        let now = Utc::now();
        record_audit(services, &id, AuditEventKind::Deleted, "system", serde_json::json!({ "id": id })).await;
        services.store.delete(&id).await?;
        services.event_bus.publish(Event::task_deleted(&id, now));
        Ok(serde_json::json!({ "id": id }))
    }
}

pub struct GetTaskStatus;
#[async_trait]
impl Command for GetTaskStatus {
    fn name(&self) -> &'static str {
        "get_task_status"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = task_id(&data)?;
        let task = services.store.get(&id).await?;
        Ok(serde_json::json!({ "id": task.id, "status": task.status.to_string() }))
    }
}
