//! Task Daemon Workflow Engine
//!
//! A deterministic, token-driven state machine. States,
//! transitions, and the effects bound to them are registered once at
//! startup ([`wiring::default_registry`]); each environment gets its own
//! [`engine::WorkflowEngine`] owning a private [`token::WorkflowToken`].
//! No module here is shared across environments or with command handlers.

pub mod agent_session;
pub mod decider;
pub mod effect;
pub mod engine;
pub mod error;
pub mod registry;
pub mod state;
pub mod token;
pub mod wiring;

pub use agent_session::{AgentSession, AgentSessionFactory, EchoAgentSession, EchoAgentSessionFactory};
pub use decider::{DefaultDecider, Decider};
pub use effect::{AlwaysPassTestRunner, CommitRunner, Effect, NoOpCommitRunner, TestRunner};
pub use engine::WorkflowEngine;
pub use error::{Result, WorkflowError};
pub use registry::{Transition, WorkflowRegistry};
pub use state::WorkflowState;
pub use token::{Context, TestResult, WorkflowToken};
