//! The command dispatch table.

pub mod audit;
pub mod daemon;
pub mod dependency;
pub mod monitoring;
pub mod scheduler;
pub mod task;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HubError, Result};
use crate::registry::{DaemonControl, EnvServices, EnvironmentRegistry};
use crate::wire::{resolve_environment, WireRequest, WireResponse};

/// Context shared by every command: the full environment map (for
/// daemon-wide introspection) and the process-wide pause/shutdown state
pub struct DispatchContext {
    pub registry: Arc<EnvironmentRegistry>,
    pub control: Arc<DaemonControl>,
}

#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &DispatchContext, services: &Arc<EnvServices>, data: Value) -> Result<Value>;
}

pub struct CommandRegistry {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder { commands: HashMap::new() }
    }

    /// Resolves the target environment, looks up the command, runs it,
    /// and converts any error into a `success:false` wire response — the
    /// dispatcher itself never propagates a handler error.
    pub async fn dispatch(&self, ctx: &DispatchContext, request: WireRequest) -> WireResponse {
        let env_name = resolve_environment(&request);
        let services = match ctx.registry.resolve(env_name.as_deref()) {
            Ok(s) => s.clone(),
            Err(e) => return WireResponse::err(&e),
        };

        let command = match self.commands.get(request.command.as_str()) {
            Some(c) => c.clone(),
            None => return WireResponse::err(&HubError::UnknownCommand(request.command)),
        };

        match command.execute(ctx, &services, request.data).await {
            Ok(value) => WireResponse::ok(value),
            Err(e) => WireResponse::err(&e),
        }
    }
}

pub struct CommandRegistryBuilder {
    commands: HashMap<&'static str, Arc<dyn Command>>,
}

impl CommandRegistryBuilder {
    pub fn register(mut self, command: Arc<dyn Command>) -> Self {
        self.commands.insert(command.name(), command);
        self
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry { commands: self.commands }
    }
}

/// Wires every built-in verb into the dispatch table.
pub fn default_registry() -> CommandRegistry {
    CommandRegistry::builder()
        .register(Arc::new(task::CreateTask))
        .register(Arc::new(task::ListTasks))
        .register(Arc::new(task::GetTask))
        .register(Arc::new(task::UpdateTaskStatus))
        .register(Arc::new(task::UpdateTaskPriority))
        .register(Arc::new(task::UpdateTask))
        .register(Arc::new(task::DeleteTask))
        .register(Arc::new(task::GetTaskStatus))
        .register(Arc::new(daemon::Restart))
        .register(Arc::new(daemon::PauseDaemon))
        .register(Arc::new(daemon::ResumeDaemon))
        .register(Arc::new(daemon::StopDaemon))
        .register(Arc::new(daemon::GetDaemonStatus))
        .register(Arc::new(dependency::Graph))
        .register(Arc::new(dependency::Visualize))
        .register(Arc::new(dependency::CriticalPath))
        .register(Arc::new(dependency::Validate))
        .register(Arc::new(dependency::Impact))
        .register(Arc::new(dependency::Bottlenecks))
        .register(Arc::new(dependency::WhatIf))
        .register(Arc::new(dependency::Cycles))
        .register(Arc::new(audit::History))
        .register(Arc::new(audit::Summary))
        .register(Arc::new(audit::Statistics))
        .register(Arc::new(audit::Prune))
        .register(Arc::new(scheduler::CreateSchedule))
        .register(Arc::new(scheduler::UpdateSchedule))
        .register(Arc::new(scheduler::DeleteSchedule))
        .register(Arc::new(scheduler::ListSchedules))
        .register(Arc::new(scheduler::ValidateCron))
        .register(Arc::new(scheduler::PauseSchedule))
        .register(Arc::new(scheduler::ResumeSchedule))
        .register(Arc::new(scheduler::FailureLog))
        .register(Arc::new(scheduler::OrderOptimization))
        .register(Arc::new(monitoring::SubscribeToTaskNotifications))
        .register(Arc::new(monitoring::CreateSession))
        .register(Arc::new(monitoring::UpdateSession))
        .register(Arc::new(monitoring::GetSession))
        .register(Arc::new(monitoring::ListSessions))
        .register(Arc::new(monitoring::CloseSession))
        .register(Arc::new(monitoring::SessionTasks))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    #[async_trait]
    impl Command for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        async fn execute(&self, _ctx: &DispatchContext, _services: &Arc<EnvServices>, data: Value) -> Result<Value> {
            Ok(data)
        }
    }

    #[test]
    fn builder_registers_commands_by_name() {
        let registry = CommandRegistry::builder().register(Arc::new(Echo)).build();
        assert!(registry.commands.contains_key("echo"));
    }
}
