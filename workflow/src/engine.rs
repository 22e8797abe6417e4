//! The cooperative workflow loop. One [`WorkflowEngine`] runs per
//! selected environment; loops never share state with each other or with
//! command handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use task_daemon_core::repository::Store;
use tracing::{error, info, warn};

use crate::agent_session::{AgentSessionFactory, DEFAULT_TURN_TIMEOUT};
use crate::effect::EffectContext;
use crate::error::{Result, WorkflowError};
use crate::registry::WorkflowRegistry;
use crate::state::WorkflowState;
use crate::token::WorkflowToken;

/// Normal inter-tick sleep.
pub const TICK_INTERVAL: Duration = Duration::from_secs(2);
/// Backoff after a non-fatal tick failure.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(5);
/// Sleep while the daemon-wide paused flag is set.
const PAUSED_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct WorkflowEngine {
    environment: String,
    store: Arc<dyn Store>,
    registry: Arc<WorkflowRegistry>,
    agent_factory: Arc<dyn AgentSessionFactory>,
    paused: Arc<AtomicBool>,
    turn_timeout: Duration,
    token: WorkflowToken,
}

impl WorkflowEngine {
    pub fn new(
        environment: impl Into<String>,
        store: Arc<dyn Store>,
        registry: Arc<WorkflowRegistry>,
        agent_factory: Arc<dyn AgentSessionFactory>,
        paused: Arc<AtomicBool>,
    ) -> Self {
        WorkflowEngine {
            environment: environment.into(),
            store,
            registry,
            agent_factory,
            paused,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            token: WorkflowToken::new(WorkflowState::NewFeatureProposed),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.token.state
    }

    /// Runs ticks forever. Returns only when a tick raises a fatal error
    ///; the caller is expected to treat a
    /// returned `Err` as cause to exit the process.
    pub async fn run(mut self) -> WorkflowError {
        loop {
            if self.paused.load(Ordering::SeqCst) {
                tokio::time::sleep(PAUSED_POLL_INTERVAL).await;
                continue;
            }

            match self.tick().await {
                Ok(()) => {
                    tokio::time::sleep(TICK_INTERVAL).await;
                }
                Err(e) if e.is_fatal() => {
                    error!(environment = %self.environment, error = %e, "fatal workflow error, terminating daemon");
                    return e;
                }
                Err(e) => {
                    warn!(environment = %self.environment, error = %e, state = %self.token.state, "tick failed, retrying");
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
            }
        }
    }

    async fn tick(&mut self) -> Result<()> {
        let tasks = self.store.scan().await?;

        let transition = if self.token.state == WorkflowState::TestsCompleted {
            let name = match self.token.context.last_test_result.as_ref() {
                Some(r) if r.passed => "tests-passing",
                Some(_) => "tests-failed",
                None => {
                    return Err(WorkflowError::NoTransition(
                        "tests-completed: no test result recorded yet".to_string(),
                    ))
                }
            };
            self.registry.lookup(WorkflowState::TestsCompleted, name)?
        } else {
            self.registry.decide(self.token.state, &tasks)?
        };

        let destination = transition.destination;
        let effect = transition.effect.clone();

        let mut effect_ctx = EffectContext {
            environment: &self.environment,
            tasks: &tasks,
            context: &mut self.token.context,
            agent_factory: &self.agent_factory,
            turn_timeout: self.turn_timeout,
        };

        match effect.run(&mut effect_ctx).await {
            Ok(()) => {
                info!(
                    environment = %self.environment,
                    from = %self.token.state,
                    to = %destination,
                    "workflow transition advanced"
                );
                self.token.state = destination;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(environment = %self.environment, state = %self.token.state, error = %e, "effect failed, staying in state");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_session::EchoAgentSessionFactory;
    use crate::effect::{AlwaysPassTestRunner, NoOpCommitRunner};
    use crate::wiring::default_registry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use task_daemon_core::error::{Result as CoreResult, TaskError};
    use task_daemon_core::models::{NewTask, Task};
    use task_daemon_core::repository::RepositoryStats;
    use tokio::sync::Mutex;

    struct InMemoryStore {
        tasks: Mutex<HashMap<String, Task>>,
    }

    impl InMemoryStore {
        fn empty() -> Self {
            InMemoryStore { tasks: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl Store for InMemoryStore {
        async fn create(&self, new: NewTask) -> CoreResult<Task> {
            let task = Task::from_new(new, chrono::Utc::now());
            self.tasks.lock().await.insert(task.id.clone(), task.clone());
            Ok(task)
        }
        async fn put(&self, task: Task) -> CoreResult<Task> {
            self.tasks.lock().await.insert(task.id.clone(), task.clone());
            Ok(task)
        }
        async fn get(&self, id: &str) -> CoreResult<Task> {
            self.tasks.lock().await.get(id).cloned().ok_or_else(|| TaskError::not_found_id(id))
        }
        async fn delete(&self, id: &str) -> CoreResult<()> {
            self.tasks.lock().await.remove(id);
            Ok(())
        }
        async fn scan(&self) -> CoreResult<Vec<Task>> {
            Ok(self.tasks.lock().await.values().cloned().collect())
        }
        async fn health_check(&self) -> CoreResult<()> {
            Ok(())
        }
        async fn get_stats(&self) -> CoreResult<RepositoryStats> {
            Ok(RepositoryStats::default())
        }
    }

    fn engine(store: Arc<dyn Store>) -> WorkflowEngine {
        let registry = Arc::new(default_registry(Arc::new(AlwaysPassTestRunner), Arc::new(NoOpCommitRunner)));
        WorkflowEngine::new(
            "default",
            store,
            registry,
            Arc::new(EchoAgentSessionFactory),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[tokio::test]
    async fn s5_empty_store_tick_advances_via_retry_product_research() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::empty());
        let mut eng = engine(store);
        assert_eq!(eng.state(), WorkflowState::NewFeatureProposed);
        eng.tick().await.unwrap();
        // retry-product-research's destination is the same state.
        assert_eq!(eng.state(), WorkflowState::NewFeatureProposed);
    }

    #[tokio::test]
    async fn task_in_progress_unconditionally_runs_tests_and_advances() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::empty());
        let mut eng = engine(store);
        eng.token.state = WorkflowState::TaskInProgress;
        eng.tick().await.unwrap();
        assert_eq!(eng.state(), WorkflowState::TestsCompleted);
    }

    #[tokio::test]
    async fn tests_completed_branches_on_last_test_result() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::empty());
        let mut eng = engine(store);
        eng.token.state = WorkflowState::TestsCompleted;
        eng.token.context.last_test_result = Some(crate::token::TestResult { passed: true, output: String::new() });
        eng.tick().await.unwrap();
        assert_eq!(eng.state(), WorkflowState::TaskCompleted);
    }

    #[tokio::test]
    async fn tests_completed_with_no_result_yet_fails_the_tick() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::empty());
        let mut eng = engine(store);
        eng.token.state = WorkflowState::TestsCompleted;
        let err = eng.tick().await.unwrap_err();
        assert!(matches!(err, WorkflowError::NoTransition(_)));
    }

    #[tokio::test]
    async fn paused_flag_suspends_ticking() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::empty());
        let paused = Arc::new(AtomicBool::new(true));
        let registry = Arc::new(default_registry(Arc::new(AlwaysPassTestRunner), Arc::new(NoOpCommitRunner)));
        let eng = WorkflowEngine::new(
            "default",
            store,
            registry,
            Arc::new(EchoAgentSessionFactory),
            paused.clone(),
        );
        let handle = tokio::spawn(eng.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
