//! Dependency Engine verbs, thin wrappers around `task_daemon_core::graph`'s
//! pure functions over the current environment's full task set.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use task_daemon_core::graph;

use super::{Command, DispatchContext};
use crate::error::{HubError, Result};
use crate::registry::EnvServices;

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

fn task_id(data: &Value) -> Result<String> {
    serde_json::from_value::<IdOnly>(data.clone()).map(|v| v.id).map_err(|e| HubError::MalformedRequest(e.to_string()))
}

/// `dependency_graph`: the adjacency list itself, for clients that want to
/// render their own layout.
pub struct Graph;
#[async_trait]
impl Command for Graph {
    fn name(&self) -> &'static str {
        "dependency_graph"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let tasks = services.store.scan().await?;
        let edges: Vec<Value> = tasks
            .iter()
            .flat_map(|t| t.dependencies.iter().map(move |d| serde_json::json!({ "from": t.id, "to": d })))
            .collect();
        Ok(serde_json::json!({ "nodes": tasks, "edges": edges }))
    }
}

/// `dependency_visualize`: the topological order plus the raw edge list,
/// falling back to a priority-only order on a cyclic graph.
pub struct Visualize;
#[async_trait]
impl Command for Visualize {
    fn name(&self) -> &'static str {
        "dependency_visualize"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let tasks = services.store.scan().await?;
        let order = match graph::topological_sort(&tasks) {
            Ok(order) => order,
            Err(_) => graph::priority_only_sort(&tasks),
        };
        Ok(serde_json::json!({ "order": order }))
    }
}

pub struct CriticalPath;
#[async_trait]
impl Command for CriticalPath {
    fn name(&self) -> &'static str {
        "dependency_critical_path"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let tasks = services.store.scan().await?;
        let report = graph::critical_path(&tasks)?;
        Ok(serde_json::to_value(report).unwrap())
    }
}

pub struct Validate;
#[async_trait]
impl Command for Validate {
    fn name(&self) -> &'static str {
        "dependency_validate"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let tasks = services.store.scan().await?;
        let report = graph::validate(&tasks);
        Ok(serde_json::to_value(report).unwrap())
    }
}

pub struct Impact;
#[async_trait]
impl Command for Impact {
    fn name(&self) -> &'static str {
        "dependency_impact"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let id = task_id(&data)?;
        let tasks = services.store.scan().await?;
        let report = graph::impact_analysis(&tasks, &id);
        Ok(serde_json::to_value(report).unwrap())
    }
}

pub struct Bottlenecks;
#[async_trait]
impl Command for Bottlenecks {
    fn name(&self) -> &'static str {
        "dependency_bottlenecks"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let tasks = services.store.scan().await?;
        let report = graph::critical_path(&tasks)?;
        Ok(serde_json::json!({ "bottlenecks": report.bottlenecks, "slack": report.slack }))
    }
}

#[derive(Deserialize)]
struct WhatIfParams {
    id: String,
    dependencies: std::collections::BTreeSet<String>,
}

/// `dependency_what_if`: checks whether replacing `id`'s dependency set
/// with `dependencies` would form a cycle, without writing anything
pub struct WhatIf;
#[async_trait]
impl Command for WhatIf {
    fn name(&self) -> &'static str {
        "dependency_what_if"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value> {
        let params: WhatIfParams = serde_json::from_value(data).map_err(|e| HubError::MalformedRequest(e.to_string()))?;
        let mut tasks = services.store.scan().await?;
        let Some(target) = tasks.iter_mut().find(|t| t.id == params.id) else {
            return Err(HubError::Task(task_daemon_core::error::TaskError::not_found_id(&params.id)));
        };
        target.dependencies = params.dependencies;
        match graph::check_write_would_cycle(&tasks) {
            Ok(()) => Ok(serde_json::json!({ "wouldFormCycle": false })),
            Err(e) => Ok(serde_json::json!({ "wouldFormCycle": true, "reason": e.to_string() })),
        }
    }
}

pub struct Cycles;
#[async_trait]
impl Command for Cycles {
    fn name(&self) -> &'static str {
        "dependency_cycles"
    }
    async fn execute(&self, _ctx: &DispatchContext, services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let tasks = services.store.scan().await?;
        match graph::detect_cycle(&tasks) {
            Some(cycle) => Ok(serde_json::json!({ "hasCycle": true, "cycle": cycle })),
            None => Ok(serde_json::json!({ "hasCycle": false, "cycle": Value::Null })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DaemonControl, EnvironmentRegistry};
    use async_trait::async_trait as at;
    use chrono::{DateTime, Utc};
    use task_daemon_core::audit::{AuditEvent, AuditFilter, AuditLog};
    use task_daemon_core::error::Result as CoreResult;
    use task_daemon_core::models::{NewTask, Priority, Task, TaskFilter};
    use task_daemon_core::repository::{RepositoryStats, Store};
    use tokio::sync::Mutex;

    struct MemStore {
        tasks: Mutex<Vec<Task>>,
    }
    #[at]
    impl Store for MemStore {
        async fn create(&self, new: NewTask) -> CoreResult<Task> {
            let t = Task::from_new(new, Utc::now());
            self.tasks.lock().await.push(t.clone());
            Ok(t)
        }
        async fn put(&self, task: Task) -> CoreResult<Task> {
            let mut tasks = self.tasks.lock().await;
            if let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) {
                *slot = task.clone();
            }
            Ok(task)
        }
        async fn get(&self, id: &str) -> CoreResult<Task> {
            self.tasks
                .lock()
                .await
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| task_daemon_core::error::TaskError::not_found_id(id))
        }
        async fn delete(&self, _id: &str) -> CoreResult<()> {
            Ok(())
        }
        async fn scan(&self) -> CoreResult<Vec<Task>> {
            Ok(self.tasks.lock().await.clone())
        }
        async fn list(&self, _filter: &TaskFilter) -> CoreResult<Vec<Task>> {
            Ok(self.tasks.lock().await.clone())
        }
        async fn health_check(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn get_stats(&self) -> CoreResult<RepositoryStats> {
            Ok(RepositoryStats::default())
        }
    }

    struct NullAudit;
    #[at]
    impl AuditLog for NullAudit {
        async fn record(&self, _event: AuditEvent) -> CoreResult<()> {
            Ok(())
        }
        async fn query(&self, _filter: &AuditFilter) -> CoreResult<Vec<AuditEvent>> {
            Ok(Vec::new())
        }
        async fn prune(&self, _now: DateTime<Utc>, _older_than: chrono::Duration) -> CoreResult<u64> {
            Ok(0)
        }
    }

    fn ctx() -> DispatchContext {
        let mut envs = std::collections::HashMap::new();
        envs.insert("default".to_string(), EnvServices::new("default", Arc::new(MemStore { tasks: Mutex::new(Vec::new()) }), Arc::new(NullAudit)));
        DispatchContext { registry: Arc::new(EnvironmentRegistry::new(envs, "default").unwrap()), control: Arc::new(DaemonControl::new()) }
    }

    #[tokio::test]
    async fn what_if_detects_a_would_be_cycle() {
        let ctx = ctx();
        let services = ctx.registry.resolve(None).unwrap().clone();
        let t1 = services.store.create(NewTask { title: "A".into(), priority: Some(Priority::High), ..Default::default() }).await.unwrap();
        let t2 = services.store.create(NewTask { title: "B".into(), dependencies: Some([t1.id.clone()].into()), ..Default::default() }).await.unwrap();

        let what_if = WhatIf;
        let result = what_if
            .execute(&ctx, &services, serde_json::json!({ "id": t1.id, "dependencies": [t2.id] }))
            .await
            .unwrap();
        assert_eq!(result["wouldFormCycle"], true);
    }

    #[tokio::test]
    async fn cycles_reports_none_for_empty_store() {
        let ctx = ctx();
        let services = ctx.registry.resolve(None).unwrap().clone();
        let result = Cycles.execute(&ctx, &services, Value::Null).await.unwrap();
        assert_eq!(result["hasCycle"], false);
    }
}
