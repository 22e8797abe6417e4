//! Daemon-control verbs. These act on the process-wide
//! [`crate::registry::DaemonControl`] rather than any one environment's
//! services tuple.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sysinfo::{Pid, System};

use super::{Command, DispatchContext};
use crate::error::Result;
use crate::registry::EnvServices;

/// Acknowledges immediately, then requests a restart. The actual listener teardown and re-exec happen in the
/// daemon's shutdown-watcher task once it observes `shutdown_requested`
pub struct Restart;
#[async_trait]
impl Command for Restart {
    fn name(&self) -> &'static str {
        "restart"
    }
    async fn execute(&self, ctx: &DispatchContext, _services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        ctx.control.request_restart();
        Ok(serde_json::json!({ "acknowledged": true }))
    }
}

pub struct PauseDaemon;
#[async_trait]
impl Command for PauseDaemon {
    fn name(&self) -> &'static str {
        "pause_daemon"
    }
    async fn execute(&self, ctx: &DispatchContext, _services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        ctx.control.paused.store(true, Ordering::SeqCst);
        Ok(serde_json::json!({ "paused": true }))
    }
}

pub struct ResumeDaemon;
#[async_trait]
impl Command for ResumeDaemon {
    fn name(&self) -> &'static str {
        "resume_daemon"
    }
    async fn execute(&self, ctx: &DispatchContext, _services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        ctx.control.paused.store(false, Ordering::SeqCst);
        Ok(serde_json::json!({ "paused": false }))
    }
}

pub struct StopDaemon;
#[async_trait]
impl Command for StopDaemon {
    fn name(&self) -> &'static str {
        "stop_daemon"
    }
    async fn execute(&self, ctx: &DispatchContext, _services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        ctx.control.request_shutdown();
        Ok(serde_json::json!({ "acknowledged": true }))
    }
}

/// `get_daemon_status`: paused flag, uptime, pid, current memory. Memory is read once per call via `sysinfo` rather than sampled
/// continuously, since this is a low-frequency introspection command.
pub struct GetDaemonStatus;
#[async_trait]
impl Command for GetDaemonStatus {
    fn name(&self) -> &'static str {
        "get_daemon_status"
    }
    async fn execute(&self, ctx: &DispatchContext, _services: &Arc<EnvServices>, _data: Value) -> Result<Value> {
        let pid = std::process::id();
        let memory_bytes = {
            let mut system = System::new();
            system.refresh_processes();
            system.process(Pid::from_u32(pid)).map(|p| p.memory()).unwrap_or(0)
        };
        Ok(serde_json::json!({
            "paused": ctx.control.paused.load(Ordering::SeqCst),
            "uptimeSeconds": ctx.control.started_at.elapsed().as_secs(),
            "pid": pid,
            "memoryBytes": memory_bytes,
            "environments": ctx.registry.names().collect::<Vec<_>>(),
        }))
    }
}
