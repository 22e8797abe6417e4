//! Top-level daemon wiring: starts the TCP Command
//! Server, the HTTP/WebSocket host, and one [`WorkflowEngine`] per
//! selected environment, then waits on [`DaemonControl`]'s shutdown
//! signal to bring everything down together.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use task_daemon_workflow::{AgentSessionFactory, WorkflowEngine, WorkflowRegistry};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::commands::{CommandRegistry, DispatchContext};
use crate::http::{self, HttpState};
use crate::registry::{DaemonControl, EnvironmentRegistry};
use crate::tcp;

/// Audit Log pruning cadence; the retention
/// window itself is a daemon config value, not hard-coded here.
const AUDIT_PRUNE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

pub struct DaemonHandles {
    pub tcp_addr: String,
    pub http_addr: String,
}

/// Runs the whole daemon to completion: spawns the TCP and HTTP servers
/// and one workflow loop per environment, then blocks until
/// `control.shutdown_requested()` fires. Returns `true` if the caller
/// should re-exec (a `restart` was requested), `false` on a plain stop.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    tcp_addr: &str,
    http_addr: &str,
    command_registry: Arc<CommandRegistry>,
    env_registry: Arc<EnvironmentRegistry>,
    control: Arc<DaemonControl>,
    workflow_registry: Arc<WorkflowRegistry>,
    agent_factory: Arc<dyn AgentSessionFactory>,
    audit_retention: chrono::Duration,
    skip_tcp: bool,
) -> anyhow::Result<bool> {
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let dispatch_ctx = Arc::new(DispatchContext { registry: env_registry.clone(), control: control.clone() });

    let mut workflow_handles = Vec::new();
    for services in env_registry.all() {
        let engine = WorkflowEngine::new(
            services.name.clone(),
            services.store.clone(),
            workflow_registry.clone(),
            agent_factory.clone(),
            control.paused.clone(),
        );
        let env_name = services.name.clone();
        workflow_handles.push(tokio::spawn(async move {
            let err = engine.run().await;
            error!(environment = %env_name, error = %err, "workflow engine stopped");
        }));
    }

    let tcp_task = if skip_tcp {
        None
    } else {
        let addr = tcp_addr.to_string();
        let registry = command_registry.clone();
        let ctx = dispatch_ctx.clone();
        let tcp_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = tcp::serve(&addr, registry, ctx, tcp_shutdown).await {
                error!(error = %e, "tcp command server failed");
            }
        }))
    };

    let listener = TcpListener::bind(http_addr).await?;
    info!(addr = http_addr, "http command server listening");
    let http_state = HttpState { registry: command_registry.clone(), ctx: dispatch_ctx.clone() };
    let app = http::router(http_state);
    let http_shutdown = shutdown.clone();
    let http_task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.notified().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "http server failed");
        }
    });

    let prune_control = control.clone();
    let prune_registry = env_registry.clone();
    let prune_shutdown = shutdown.clone();
    let prune_task = tokio::spawn(async move {
        let _ = &prune_control;
        let mut interval = tokio::time::interval(AUDIT_PRUNE_INTERVAL);
        loop {
            tokio::select! {
                _ = prune_shutdown.notified() => return,
                _ = interval.tick() => {
                    let now = chrono::Utc::now();
                    for services in prune_registry.all() {
                        match services.audit.prune(now, audit_retention).await {
                            Ok(n) if n > 0 => info!(environment = %services.name, pruned = n, "audit log pruned"),
                            Ok(_) => {}
                            Err(e) => error!(environment = %services.name, error = %e, "audit prune failed"),
                        }
                    }
                }
            }
        }
    });

    control.shutdown_requested().await;
    info!("shutdown requested, stopping daemon");
    shutdown.notify_waiters();

    for handle in workflow_handles {
        handle.abort();
    }
    if let Some(handle) = tcp_task {
        let _ = handle.await;
    }
    let _ = http_task.await;
    prune_task.abort();

    // Grace period so in-flight responses finish writing.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;

    Ok(control.restart_requested.load(Ordering::SeqCst))
}
