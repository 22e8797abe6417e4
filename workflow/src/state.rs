//! The eight registered Workflow Engine states.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowState {
    NewFeatureProposed,
    FeaturesPrioritized,
    StoriesCreated,
    StoriesPrioritized,
    TasksPrepared,
    TaskInProgress,
    TestsCompleted,
    TaskCompleted,
}

impl WorkflowState {
    pub const ALL: [WorkflowState; 8] = [
        WorkflowState::NewFeatureProposed,
        WorkflowState::FeaturesPrioritized,
        WorkflowState::StoriesCreated,
        WorkflowState::StoriesPrioritized,
        WorkflowState::TasksPrepared,
        WorkflowState::TaskInProgress,
        WorkflowState::TestsCompleted,
        WorkflowState::TaskCompleted,
    ];
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowState::NewFeatureProposed => "new-feature-proposed",
            WorkflowState::FeaturesPrioritized => "features-prioritized",
            WorkflowState::StoriesCreated => "stories-created",
            WorkflowState::StoriesPrioritized => "stories-prioritized",
            WorkflowState::TasksPrepared => "tasks-prepared",
            WorkflowState::TaskInProgress => "task-in-progress",
            WorkflowState::TestsCompleted => "tests-completed",
            WorkflowState::TaskCompleted => "task-completed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_round_trips_through_serde() {
        for state in WorkflowState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            let back: WorkflowState = serde_json::from_str(&json).unwrap();
            assert_eq!(back, state);
        }
    }
}
