//! Builds the registered state/transition/effect graph. The eight states,
//! their transition names, and the prompts bound to each are declared
//! here in one place so the whole workflow shape is visible at a glance.

use std::sync::Arc;

use crate::decider::DefaultDecider;
use crate::effect::{AgentTurnEffect, CommitRunner, LocalCommitEffect, LocalTestEffect, NoOpEffect, TestRunner};
use crate::registry::WorkflowRegistry;
use crate::state::WorkflowState as S;

pub fn default_registry(test_runner: Arc<dyn TestRunner>, commit_runner: Arc<dyn CommitRunner>) -> WorkflowRegistry {
    fn turn(profile: &str, prompt: &str) -> Arc<AgentTurnEffect> {
        Arc::new(AgentTurnEffect { profile: profile.to_string(), prompt: prompt.to_string() })
    }

    WorkflowRegistry::builder(Arc::new(DefaultDecider))
        .transition(
            S::NewFeatureProposed,
            "prioritize-features",
            S::FeaturesPrioritized,
            turn("product-manager", "Prioritize the newly proposed features."),
        )
        .transition(
            S::NewFeatureProposed,
            "retry-product-research",
            S::NewFeatureProposed,
            turn("product-research", "Research and propose a new product feature."),
        )
        .transition(
            S::FeaturesPrioritized,
            "create-stories",
            S::StoriesCreated,
            turn("story-writer", "Break the highest-priority feature into stories."),
        )
        .transition(
            S::FeaturesPrioritized,
            "retry-feature-prioritization",
            S::FeaturesPrioritized,
            turn("product-manager", "Re-evaluate feature priorities."),
        )
        .transition(
            S::StoriesCreated,
            "prioritize-stories",
            S::StoriesPrioritized,
            turn("product-manager", "Prioritize the newly created stories."),
        )
        .transition(
            S::StoriesCreated,
            "retry-story-creation",
            S::StoriesCreated,
            turn("story-writer", "Create stories for the prioritized features."),
        )
        .transition(
            S::StoriesPrioritized,
            "prepare-tasks",
            S::TasksPrepared,
            turn("tech-lead", "Break the highest-priority story into tasks."),
        )
        .transition(
            S::StoriesPrioritized,
            "retry-story-prioritization",
            S::StoriesPrioritized,
            turn("product-manager", "Re-evaluate story priorities."),
        )
        .transition(
            S::TasksPrepared,
            "start-task",
            S::TaskInProgress,
            turn("engineer", "Start work on the next ready task."),
        )
        .transition(
            S::TasksPrepared,
            "retry-task-preparation",
            S::TasksPrepared,
            turn("tech-lead", "Prepare executable tasks from the prioritized stories."),
        )
        .transition(
            S::TaskInProgress,
            "run-tests",
            S::TestsCompleted,
            Arc::new(LocalTestEffect { runner: test_runner }),
        )
        .transition(
            S::TestsCompleted,
            "tests-passing",
            S::TaskCompleted,
            Arc::new(LocalCommitEffect { runner: commit_runner }),
        )
        .transition(
            S::TestsCompleted,
            "tests-failed",
            S::TaskInProgress,
            turn("engineer", "Fix the failing tests and try again."),
        )
        .transition(
            S::TaskCompleted,
            "restart-cycle",
            S::NewFeatureProposed,
            Arc::new(NoOpEffect),
        )
        .build()
}
