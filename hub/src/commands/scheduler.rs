//! Scheduler verbs, thin CRUD over the per-environment [`crate::scheduler::Scheduler`]
//! (itself a thin layer; full auto-assignment logic lives outside this crate).

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use task_daemon_core::models::NewTask;

use super::{Command, DispatchContext};
use crate::error::{HubError, Result};
use crate::registry::EnvServices;
use crate::scheduler::validate_cron;

#[derive(Deserialize)]
struct CreateParams {
    #[serde(rename = "cronExpression")]
    cron_expression: String,
    #[serde(rename = "taskTemplate")]
    task_template: NewTask,
}

pub struct CreateSchedule;
#[async_trait]
impl Command for CreateSchedule {
    fn name(&self) -> &'static str {
        "scheduler_create"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: CreateParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let task = services
            .scheduler
            .create(params.cron_expression, params.task_template)
            .await
            .map_err(HubError::MalformedRequest)?;
        Ok(serde_json::to_value(task).unwrap())
    }
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

fn schedule_id(data: &Value) -> Result<String> {
    serde_json::from_value::<IdOnly>(data.clone()).map(|v| v.id).map_err(|e| HubError::MalformedRequest(e.to_string()))
}

#[derive(Deserialize)]
struct UpdateParams {
    id: String,
    #[serde(rename = "cronExpression")]
    cron_expression: String,
}

pub struct UpdateSchedule;
#[async_trait]
impl Command for UpdateSchedule {
    fn name(&self) -> &'static str {
        "scheduler_update"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: UpdateParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let task = services.scheduler.update_cron(&params.id, params.cron_expression).await.map_err(HubError::MalformedRequest)?;
        Ok(serde_json::to_value(task).unwrap())
    }
}

pub struct DeleteSchedule;
#[async_trait]
impl Command for DeleteSchedule {
    fn name(&self) -> &'static str {
        "scheduler_delete"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = schedule_id(&data)?;
        let deleted = services.scheduler.delete(&id).await;
        Ok(serde_json::json!({ "deleted": deleted }))
    }
}

pub struct ListSchedules;
#[async_trait]
impl Command for ListSchedules {
    fn name(&self) -> &'static str {
        "scheduler_list"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        Ok(serde_json::to_value(services.scheduler.list().await).unwrap())
    }
}

#[derive(Deserialize)]
struct ValidateCronParams {
    #[serde(rename = "cronExpression")]
    cron_expression: String,
}

pub struct ValidateCron;
#[async_trait]
impl Command for ValidateCron {
    fn name(&self) -> &'static str {
        "scheduler_validate_cron"
    }
    async fn execute(&self, _ctx: &DispatchContext, _services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: ValidateCronParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        match validate_cron(&params.cron_expression) {
            Ok(()) => Ok(serde_json::json!({ "valid": true })),
            Err(reason) => Ok(serde_json::json!({ "valid": false, "reason": reason })),
        }
    }
}

pub struct PauseSchedule;
#[async_trait]
impl Command for PauseSchedule {
    fn name(&self) -> &'static str {
        "scheduler_pause"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = schedule_id(&data)?;
        Ok(serde_json::json!({ "paused": services.scheduler.pause(&id).await }))
    }
}

pub struct ResumeSchedule;
#[async_trait]
impl Command for ResumeSchedule {
    fn name(&self) -> &'static str {
        "scheduler_resume"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = schedule_id(&data)?;
        Ok(serde_json::json!({ "resumed": services.scheduler.resume(&id).await }))
    }
}

pub struct FailureLog;
#[async_trait]
impl Command for FailureLog {
    fn name(&self) -> &'static str {
        "scheduler_failure_log"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = schedule_id(&data)?;
        let schedule = services.scheduler.get(&id).await.ok_or_else(|| HubError::MalformedRequest(format!("unknown scheduled task: {id}")))?;
        Ok(serde_json::to_value(schedule.failure_log).unwrap())
    }
}

pub struct OrderOptimization;
#[async_trait]
impl Command for OrderOptimization {
    fn name(&self) -> &'static str {
        "scheduler_order_optimization"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        Ok(serde_json::to_value(services.scheduler.optimized_order().await).unwrap())
    }
}
