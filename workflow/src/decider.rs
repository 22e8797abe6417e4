//! The Decider: the pure function mapping `(state, task set) -> transition
//! name`. Deterministic: the same task set
//! always yields the same transition name.

use task_daemon_core::models::{Task, TaskStatus, TaskType};

use crate::state::WorkflowState;

pub trait Decider: Send + Sync {
    /// Returns `None` only when the state genuinely has no registered
    /// fallback transition; every state registered by
    /// [`crate::registry::default_registry`] always returns `Some`, so a
    /// `None` here becomes `WorkflowError::NoTransition`.
    fn decide(&self, state: WorkflowState, tasks: &[Task]) -> Option<String>;
}

fn has_todo_of_type(tasks: &[Task], task_type: TaskType) -> bool {
    tasks.iter().any(|t| t.task_type == task_type && t.status == TaskStatus::Todo)
}

fn has_high_priority_todo_of_type(tasks: &[Task], task_type: TaskType) -> bool {
    tasks.iter().any(|t| {
        t.task_type == task_type
            && t.status == TaskStatus::Todo
            && t.priority == task_daemon_core::models::Priority::High
    })
}

/// Any `Task`/`Implementation`/`Integration`/`Testing`/`Research` task
/// that is `todo` and whose dependencies are all `done` — i.e. ready to
/// start, the same readiness notion `topological_sort` uses for
/// zero-in-degree nodes restricted to incomplete dependents.
fn has_ready_executable_task(tasks: &[Task]) -> bool {
    let by_id: std::collections::HashMap<&str, &Task> =
        tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    tasks.iter().any(|t| {
        matches!(
            t.task_type,
            TaskType::Task | TaskType::Implementation | TaskType::Integration | TaskType::Testing | TaskType::Research
        ) && t.status == TaskStatus::Todo
            && t.dependencies.iter().all(|d| {
                by_id.get(d.as_str()).map(|dep| dep.status == TaskStatus::Done).unwrap_or(false)
            })
    })
}

/// The default decider registered for every state: for an empty or
/// not-yet-ready task set it selects a registered retry transition (e.g.
/// `retry-product-research`), so the decision function is always total.
/// Each state has exactly one "advance" transition, gated on a readiness
/// predicate over the current task set, and one "retry" transition taken
/// otherwise — so the function always returns `Some`, never `None`, for
/// the eight registered states (the engine still treats `None` as
/// possible for forward-compatibility with custom deciders).
pub struct DefaultDecider;

impl Decider for DefaultDecider {
    fn decide(&self, state: WorkflowState, tasks: &[Task]) -> Option<String> {
        let name = match state {
            WorkflowState::NewFeatureProposed => {
                if has_todo_of_type(tasks, TaskType::Feature) {
                    "prioritize-features"
                } else {
                    "retry-product-research"
                }
            }
            WorkflowState::FeaturesPrioritized => {
                if has_high_priority_todo_of_type(tasks, TaskType::Feature) {
                    "create-stories"
                } else {
                    "retry-feature-prioritization"
                }
            }
            WorkflowState::StoriesCreated => {
                if has_todo_of_type(tasks, TaskType::Story) {
                    "prioritize-stories"
                } else {
                    "retry-story-creation"
                }
            }
            WorkflowState::StoriesPrioritized => {
                if has_high_priority_todo_of_type(tasks, TaskType::Story) {
                    "prepare-tasks"
                } else {
                    "retry-story-prioritization"
                }
            }
            WorkflowState::TasksPrepared => {
                if has_ready_executable_task(tasks) {
                    "start-task"
                } else {
                    "retry-task-preparation"
                }
            }
            // Unconditional: once a task is in progress the engine always
            // moves on to run tests next tick.
            WorkflowState::TaskInProgress => "run-tests",
            // `tests-completed` is special-cased by the engine itself
            //: it branches on
            // `context.last_test_result.passed` rather than asking the
            // decider. This arm exists only so `decide` is total.
            WorkflowState::TestsCompleted => "tests-passing",
            WorkflowState::TaskCompleted => "restart-cycle",
        };
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use task_daemon_core::models::NewTask;

    fn task(task_type: TaskType, status: TaskStatus) -> Task {
        let mut t = Task::from_new(
            NewTask { title: "t".to_string(), task_type: Some(task_type), ..Default::default() },
            Utc::now(),
        );
        t.status = status;
        t
    }

    #[test]
    fn s5_empty_store_selects_retry_product_research() {
        let decider = DefaultDecider;
        let name = decider.decide(WorkflowState::NewFeatureProposed, &[]).unwrap();
        assert_eq!(name, "retry-product-research");
    }

    #[test]
    fn new_feature_proposed_advances_when_a_feature_exists() {
        let decider = DefaultDecider;
        let tasks = vec![task(TaskType::Feature, TaskStatus::Todo)];
        let name = decider.decide(WorkflowState::NewFeatureProposed, &tasks).unwrap();
        assert_eq!(name, "prioritize-features");
    }

    #[test]
    fn task_in_progress_is_unconditional() {
        let decider = DefaultDecider;
        assert_eq!(decider.decide(WorkflowState::TaskInProgress, &[]).unwrap(), "run-tests");
    }
}
