//! Environment Registry: a per-environment tuple of
//! `{ store, audit, broadcaster, scheduler, monitor }` plus the event bus
//! that ties the Store/Audit mutations to the broadcaster and monitor,
//! resolved from an environment header, a command field, or a default.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use task_daemon_core::audit::AuditLog;
use task_daemon_core::repository::Store;
use tracing::{info, warn};

use crate::error::{HubError, Result};
use crate::events_bus::EventBus;
use crate::monitor::TaskMonitor;
use crate::scheduler::Scheduler;
use crate::ws::Broadcaster;

/// The per-environment services tuple.
pub struct EnvServices {
    pub name: String,
    pub store: Arc<dyn Store>,
    pub audit: Arc<dyn AuditLog>,
    pub broadcaster: Arc<Broadcaster>,
    pub scheduler: Arc<Scheduler>,
    pub monitor: Arc<TaskMonitor>,
    pub event_bus: Arc<EventBus>,
}

impl EnvServices {
    /// Builds the tuple and wires the event bus to the broadcaster and
    /// monitor so every publish fans out to both without either knowing
    /// about the Store or Audit Log that produced the event.
    pub fn new(name: impl Into<String>, store: Arc<dyn Store>, audit: Arc<dyn AuditLog>) -> Arc<Self> {
        let services = Arc::new(EnvServices {
            name: name.into(),
            store,
            audit,
            broadcaster: Arc::new(Broadcaster::new()),
            scheduler: Arc::new(Scheduler::new()),
            monitor: Arc::new(TaskMonitor::new()),
            event_bus: Arc::new(EventBus::new()),
        });

        let broadcaster = services.broadcaster.clone();
        let monitor = services.monitor.clone();
        let mut rx = services.event_bus.subscribe();
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event bus subscriber lagged, resuming");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                broadcaster.broadcast(&event).await;
                if let Some(task_id) = event.data.get("task").and_then(|t| t.get("id")).and_then(|v| v.as_str()) {
                    monitor.notify(task_id, &event).await;
                } else if let Some(task_id) = event.data.get("taskId").and_then(|v| v.as_str()) {
                    monitor.notify(task_id, &event).await;
                }
            }
        });

        crate::ws::spawn_liveness_sweep(services.broadcaster.clone());

        services
    }
}

/// Process-wide daemon control state shared across every environment
pub struct DaemonControl {
    pub paused: Arc<AtomicBool>,
    pub started_at: Instant,
    /// Set by `restart` so the process that observes shutdown knows to
    /// re-exec itself rather than exit for good.
    pub restart_requested: Arc<AtomicBool>,
    shutdown: tokio::sync::Notify,
}

impl DaemonControl {
    pub fn new() -> Self {
        DaemonControl {
            paused: Arc::new(AtomicBool::new(false)),
            started_at: Instant::now(),
            restart_requested: Arc::new(AtomicBool::new(false)),
            shutdown: tokio::sync::Notify::new(),
        }
    }

    pub fn request_shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    pub async fn shutdown_requested(&self) {
        self.shutdown.notified().await;
    }
}

impl Default for DaemonControl {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EnvironmentRegistry {
    environments: HashMap<String, Arc<EnvServices>>,
    default_env: String,
}

impl EnvironmentRegistry {
    pub fn new(environments: HashMap<String, Arc<EnvServices>>, default_env: impl Into<String>) -> Result<Self> {
        let default_env = default_env.into();
        if !environments.contains_key(&default_env) {
            return Err(HubError::UnknownEnvironment(default_env));
        }
        info!(
            environments = ?environments.keys().collect::<Vec<_>>(),
            default = %default_env,
            "environment registry ready"
        );
        Ok(EnvironmentRegistry { environments, default_env })
    }

    pub fn default_env(&self) -> &str {
        &self.default_env
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EnvServices>> {
        self.environments.get(name)
    }

    /// Resolves a request to its target tuple: `name` if given, else the
    /// registry's default.
    pub fn resolve(&self, name: Option<&str>) -> Result<&Arc<EnvServices>> {
        let key = name.unwrap_or(&self.default_env);
        self.environments
            .get(key)
            .ok_or_else(|| HubError::UnknownEnvironment(key.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.environments.keys()
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<EnvServices>> {
        self.environments.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use task_daemon_core::audit::{AuditEvent, AuditFilter};
    use task_daemon_core::error::Result as CoreResult;
    use task_daemon_core::models::{NewTask, Task, TaskFilter};
    use task_daemon_core::repository::RepositoryStats;

    struct NullStore;
    #[async_trait]
    impl Store for NullStore {
        async fn create(&self, _new: NewTask) -> CoreResult<Task> {
            unimplemented!()
        }
        async fn put(&self, _task: Task) -> CoreResult<Task> {
            unimplemented!()
        }
        async fn get(&self, id: &str) -> CoreResult<Task> {
            Err(task_daemon_core::error::TaskError::not_found_id(id))
        }
        async fn delete(&self, _id: &str) -> CoreResult<()> {
            Ok(())
        }
        async fn scan(&self) -> CoreResult<Vec<Task>> {
            Ok(Vec::new())
        }
        async fn list(&self, _filter: &TaskFilter) -> CoreResult<Vec<Task>> {
            Ok(Vec::new())
        }
        async fn health_check(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn get_stats(&self) -> CoreResult<RepositoryStats> {
            Ok(RepositoryStats::default())
        }
    }

    struct NullAudit;
    #[async_trait]
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

    fn services(name: &str) -> Arc<EnvServices> {
        EnvServices::new(name, Arc::new(NullStore), Arc::new(NullAudit))
    }

    #[tokio::test]
    async fn rejects_unknown_default_environment() {
        let mut envs = HashMap::new();
        envs.insert("default".to_string(), services("default"));
        assert!(EnvironmentRegistry::new(envs, "missing").is_err());
    }

    #[tokio::test]
    async fn resolves_named_environment_or_falls_back_to_default() {
        let mut envs = HashMap::new();
        envs.insert("default".to_string(), services("default"));
        envs.insert("staging".to_string(), services("staging"));
        let registry = EnvironmentRegistry::new(envs, "default").unwrap();

        assert_eq!(registry.resolve(None).unwrap().name, "default");
        assert_eq!(registry.resolve(Some("staging")).unwrap().name, "staging");
        assert!(registry.resolve(Some("missing")).is_err());
    }
}
