//! The Agent Session Adapter: the external collaborator
//! that actually produces text output is out of this crate's scope — the
//! engine only drives it through this small request/response contract,
//! injected as an `Arc<dyn Trait>` like every other collaborator here.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, WorkflowError};

/// Default agent turn timeout.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(30);

/// A single request/response exchange with an agent session (a "turn").
#[async_trait]
pub trait AgentSession: Send + Sync {
    /// Sends `prompt` and awaits the agent's reply. Callers apply the
    /// timeout (see [`DEFAULT_TURN_TIMEOUT`]); implementations should not
    /// need to self-enforce it.
    async fn send_turn(&self, prompt: &str) -> Result<String>;

    /// Cleanly terminates the session. Called when the bound profile
    /// changes or the daemon shuts down.
    async fn close(&self) -> Result<()>;

    /// The profile this session was started for.
    fn profile(&self) -> &str;
}

/// Starts a session for a named [`Profile`] — "a named
/// agent role bound to one or more workflow transitions". One factory is
/// shared by every environment's workflow loop.
#[async_trait]
pub trait AgentSessionFactory: Send + Sync {
    async fn start(&self, profile: &str) -> Result<Box<dyn AgentSession>>;
}

/// Awaits `session.send_turn(prompt)` with [`DEFAULT_TURN_TIMEOUT`] (or
/// `timeout` if given), mapping an elapsed deadline to
/// [`WorkflowError::SessionTimeout`].
pub async fn send_turn_with_timeout(
    session: &dyn AgentSession,
    prompt: &str,
    timeout: Option<Duration>,
) -> Result<String> {
    let deadline = timeout.unwrap_or(DEFAULT_TURN_TIMEOUT);
    match tokio::time::timeout(deadline, session.send_turn(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(WorkflowError::SessionTimeout),
    }
}

/// In-process stub used by `--test-mode` and tests: replies immediately
/// without talking to a real agent transport.
pub struct EchoAgentSession {
    profile: String,
}

impl EchoAgentSession {
    pub fn new(profile: impl Into<String>) -> Self {
        Self { profile: profile.into() }
    }
}

#[async_trait]
impl AgentSession for EchoAgentSession {
    async fn send_turn(&self, prompt: &str) -> Result<String> {
        Ok(format!("ack: {prompt}"))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn profile(&self) -> &str {
        &self.profile
    }
}

/// Factory pairing with [`EchoAgentSession`].
pub struct EchoAgentSessionFactory;

#[async_trait]
impl AgentSessionFactory for EchoAgentSessionFactory {
    async fn start(&self, profile: &str) -> Result<Box<dyn AgentSession>> {
        Ok(Box::new(EchoAgentSession::new(profile)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_session_replies_immediately() {
        let session = EchoAgentSession::new("product-manager");
        let reply = send_turn_with_timeout(&session, "hello", None).await.unwrap();
        assert_eq!(reply, "ack: hello");
        assert_eq!(session.profile(), "product-manager");
    }

    #[tokio::test]
    async fn factory_starts_a_session_bound_to_the_requested_profile() {
        let factory = EchoAgentSessionFactory;
        let session = factory.start("engineer").await.unwrap();
        assert_eq!(session.profile(), "engineer");
    }
}
