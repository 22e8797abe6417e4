//! The Workflow Token: process-local, never
//! persisted, sole ownership by the workflow loop.

use crate::agent_session::AgentSession;
use crate::state::WorkflowState;

/// Result of the "local test run" effect.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub passed: bool,
    pub output: String,
}

/// Open-ended context carried by the token. The two
/// named fields are first-class; `extra` is the escape hatch for anything
/// an effect wants to stash between ticks without a new named field.
pub struct Context {
    pub agent_profile: Option<String>,
    pub agent_session: Option<Box<dyn AgentSession>>,
    pub last_test_result: Option<TestResult>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            agent_profile: None,
            agent_session: None,
            last_test_result: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// `{ state, context }`, owned exclusively by one environment's workflow
/// loop.
pub struct WorkflowToken {
    pub state: WorkflowState,
    pub context: Context,
}

impl WorkflowToken {
    pub fn new(initial: WorkflowState) -> Self {
        WorkflowToken { state: initial, context: Context::default() }
    }
}
