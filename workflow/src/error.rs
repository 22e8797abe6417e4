use task_daemon_core::error::TaskError;

/// Errors surfaced by the Workflow Engine. `NoTransition` is fatal only for
/// the current tick; `Task` errors inherit
/// [`TaskError::is_fatal`] for the two DB-unavailable kinds that terminate
/// the daemon.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("no registered transition for state '{0}'")]
    NoTransition(String),

    #[error("agent session turn timed out")]
    SessionTimeout,

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl WorkflowError {
    /// True for the DB-unavailable kinds that must terminate the daemon
    /// rather than back off and retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkflowError::Task(e) if e.is_fatal())
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
