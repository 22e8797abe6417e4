//! Transition effects: each effect is an explicit
//! value implementing `run`, not a closure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use task_daemon_core::models::Task;

use crate::agent_session::{send_turn_with_timeout, AgentSessionFactory};
use crate::error::Result;
use crate::token::{Context, TestResult};

/// Everything one effect invocation needs: the task set read at the top of
/// the tick, the mutable token context, and the shared agent session
/// factory. Effects never touch the Store directly — a local effect
/// mutating Task rows would race the command handlers' own
/// read-modify-write path.
pub struct EffectContext<'a> {
    pub environment: &'a str,
    pub tasks: &'a [Task],
    pub context: &'a mut Context,
    pub agent_factory: &'a Arc<dyn AgentSessionFactory>,
    pub turn_timeout: Duration,
}

#[async_trait]
pub trait Effect: Send + Sync {
    async fn run(&self, ctx: &mut EffectContext<'_>) -> Result<()>;
}

/// Ensures a session exists for `profile`, cleanly tearing down a session
/// bound to a different profile first, then
/// sends `prompt`, and awaits completion with `ctx.turn_timeout`. Failure
/// (including timeout) propagates to the caller, which swallows it and
/// retries the same state next tick.
pub struct AgentTurnEffect {
    pub profile: String,
    pub prompt: String,
}

#[async_trait]
impl Effect for AgentTurnEffect {
    async fn run(&self, ctx: &mut EffectContext<'_>) -> Result<()> {
        let needs_new_session = match &ctx.context.agent_profile {
            Some(current) if current == &self.profile => false,
            _ => true,
        };

        if needs_new_session {
            if let Some(old) = ctx.context.agent_session.take() {
                old.close().await?;
            }
            let session = ctx.agent_factory.start(&self.profile).await?;
            ctx.context.agent_session = Some(session);
            ctx.context.agent_profile = Some(self.profile.clone());
        }

        let session = ctx
            .context
            .agent_session
            .as_deref()
            .expect("session established above");
        send_turn_with_timeout(session, &self.prompt, Some(ctx.turn_timeout)).await?;
        Ok(())
    }
}

/// Runs lint/tests via an external runner and records `context.last_test_result`.
/// The runner is injected so tests can stub it without spawning a real
/// subprocess.
#[async_trait]
pub trait TestRunner: Send + Sync {
    async fn run_tests(&self, environment: &str) -> Result<TestResult>;
}

pub struct LocalTestEffect {
    pub runner: Arc<dyn TestRunner>,
}

#[async_trait]
impl Effect for LocalTestEffect {
    async fn run(&self, ctx: &mut EffectContext<'_>) -> Result<()> {
        let result = self.runner.run_tests(ctx.environment).await?;
        ctx.context.last_test_result = Some(result);
        Ok(())
    }
}

/// Commits pending changes if any exist, with a generated message.
#[async_trait]
pub trait CommitRunner: Send + Sync {
    async fn commit_if_dirty(&self, environment: &str, message: &str) -> Result<bool>;
}

pub struct LocalCommitEffect {
    pub runner: Arc<dyn CommitRunner>,
}

#[async_trait]
impl Effect for LocalCommitEffect {
    async fn run(&self, ctx: &mut EffectContext<'_>) -> Result<()> {
        let message = format!("workflow: advance {} at tick", ctx.environment);
        self.runner.commit_if_dirty(ctx.environment, &message).await?;
        Ok(())
    }
}

/// No observable side effect; used for transitions that only move the
/// token (e.g. `task-completed -> new-feature-proposed` restarting the
/// cycle).
pub struct NoOpEffect;

#[async_trait]
impl Effect for NoOpEffect {
    async fn run(&self, _ctx: &mut EffectContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// [`TestRunner`] stub used by `--test-mode` and unit tests: always
/// reports success without spawning a subprocess.
pub struct AlwaysPassTestRunner;

#[async_trait]
impl TestRunner for AlwaysPassTestRunner {
    async fn run_tests(&self, _environment: &str) -> Result<TestResult> {
        Ok(TestResult { passed: true, output: String::new() })
    }
}

/// [`CommitRunner`] stub used by `--test-mode` and unit tests.
pub struct NoOpCommitRunner;

#[async_trait]
impl CommitRunner for NoOpCommitRunner {
    async fn commit_if_dirty(&self, _environment: &str, _message: &str) -> Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_session::EchoAgentSessionFactory;

    #[tokio::test]
    async fn agent_turn_starts_a_session_on_first_use() {
        let factory: Arc<dyn AgentSessionFactory> = Arc::new(EchoAgentSessionFactory);
        let mut context = Context::default();
        let mut effect_ctx = EffectContext {
            environment: "default",
            tasks: &[],
            context: &mut context,
            agent_factory: &factory,
            turn_timeout: Duration::from_secs(1),
        };
        let effect = AgentTurnEffect {
            profile: "product-manager".to_string(),
            prompt: "propose a feature".to_string(),
        };
        effect.run(&mut effect_ctx).await.unwrap();
        assert_eq!(context.agent_profile.as_deref(), Some("product-manager"));
    }

    #[tokio::test]
    async fn agent_turn_replaces_session_when_profile_changes() {
        let factory: Arc<dyn AgentSessionFactory> = Arc::new(EchoAgentSessionFactory);
        let mut context = Context::default();
        {
            let mut effect_ctx = EffectContext {
                environment: "default",
                tasks: &[],
                context: &mut context,
                agent_factory: &factory,
                turn_timeout: Duration::from_secs(1),
            };
            AgentTurnEffect { profile: "a".to_string(), prompt: "x".to_string() }
                .run(&mut effect_ctx)
                .await
                .unwrap();
        }
        {
            let mut effect_ctx = EffectContext {
                environment: "default",
                tasks: &[],
                context: &mut context,
                agent_factory: &factory,
                turn_timeout: Duration::from_secs(1),
            };
            AgentTurnEffect { profile: "b".to_string(), prompt: "y".to_string() }
                .run(&mut effect_ctx)
                .await
                .unwrap();
        }
        assert_eq!(context.agent_profile.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn local_test_effect_records_result() {
        let factory: Arc<dyn AgentSessionFactory> = Arc::new(EchoAgentSessionFactory);
        let mut context = Context::default();
        let mut effect_ctx = EffectContext {
            environment: "default",
            tasks: &[],
            context: &mut context,
            agent_factory: &factory,
            turn_timeout: Duration::from_secs(1),
        };
        let effect = LocalTestEffect { runner: Arc::new(AlwaysPassTestRunner) };
        effect.run(&mut effect_ctx).await.unwrap();
        assert!(context.last_test_result.as_ref().unwrap().passed);
    }
}
