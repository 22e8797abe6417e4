//! The transition registry: a `(state, transition) -> effect` map built
//! once at startup and shared read-only by every environment's workflow
//! loop.

use std::collections::HashMap;
use std::sync::Arc;

use task_daemon_core::models::Task;

use crate::decider::Decider;
use crate::effect::Effect;
use crate::error::{Result, WorkflowError};
use crate::state::WorkflowState;

pub struct Transition {
    pub name: String,
    pub destination: WorkflowState,
    pub effect: Arc<dyn Effect>,
}

pub struct WorkflowRegistry {
    transitions: HashMap<WorkflowState, Vec<Transition>>,
    decider: Arc<dyn Decider>,
}

impl WorkflowRegistry {
    pub fn builder(decider: Arc<dyn Decider>) -> WorkflowRegistryBuilder {
        WorkflowRegistryBuilder { transitions: HashMap::new(), decider }
    }

    /// Runs the registered decider, then looks up the chosen transition.
    /// Returns `NoTransition` if the decider has no opinion, or if it
    /// named a transition that was never registered for this state
    ///.
    pub fn decide(&self, state: WorkflowState, tasks: &[Task]) -> Result<&Transition> {
        let name = self
            .decider
            .decide(state, tasks)
            .ok_or_else(|| WorkflowError::NoTransition(state.to_string()))?;
        self.lookup(state, &name)
    }

    /// Looks up a transition by name directly, bypassing the decider. Used
    /// by the engine for `tests-completed`, whose next transition is
    /// chosen by branching on `context.last_test_result` rather than by
    /// asking the decider.
    pub fn lookup(&self, state: WorkflowState, name: &str) -> Result<&Transition> {
        self.transitions
            .get(&state)
            .and_then(|ts| ts.iter().find(|t| t.name == name))
            .ok_or_else(|| WorkflowError::NoTransition(format!("{state}::{name}")))
    }
}

pub struct WorkflowRegistryBuilder {
    transitions: HashMap<WorkflowState, Vec<Transition>>,
    decider: Arc<dyn Decider>,
}

impl WorkflowRegistryBuilder {
    pub fn transition(
        mut self,
        state: WorkflowState,
        name: impl Into<String>,
        destination: WorkflowState,
        effect: Arc<dyn Effect>,
    ) -> Self {
        self.transitions.entry(state).or_default().push(Transition {
            name: name.into(),
            destination,
            effect,
        });
        self
    }

    pub fn build(self) -> WorkflowRegistry {
        WorkflowRegistry { transitions: self.transitions, decider: self.decider }
    }
}
