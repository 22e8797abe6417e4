//! Command/Event Hub
//!
//! The transport-agnostic core of the Task Daemon's API surface: a typed [`commands::CommandRegistry`] dispatches requests
//! parsed off any of three wire surfaces — newline-delimited JSON over TCP
//! ([`tcp`]), HTTP `/rpc` and a REST-ish projection, and WebSocket
//! broadcast ([`http`], [`ws`]) — against a per-environment services
//! tuple ([`registry::EnvServices`]) resolved by [`registry::EnvironmentRegistry`].
//!
//! Every Store or Audit Log mutation a command performs also publishes an
//! [`task_daemon_core::events::Event`] onto that environment's
//! [`events_bus::EventBus`], which fans out to the WebSocket broadcaster
//! and the task-completion [`monitor::TaskMonitor`] without either
//! knowing what produced the event.

pub mod commands;
pub mod error;
pub mod events_bus;
pub mod http;
pub mod monitor;
pub mod registry;
pub mod request_logger;
pub mod scheduler;
pub mod server;
pub mod tcp;
pub mod wire;
pub mod ws;

pub use commands::{default_registry, CommandRegistry, DispatchContext};
pub use error::{HubError, Result};
pub use registry::{DaemonControl, EnvServices, EnvironmentRegistry};
pub use wire::{WireRequest, WireResponse};
