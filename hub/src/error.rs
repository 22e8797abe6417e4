//! Hub-layer error taxonomy, grounded on `core/src/error.rs`'s
//! named-variant-plus-`name()` shape. `TaskError` already covers store and
//! workflow failures; `HubError` adds the wire-protocol and registry
//! failures that only make sense at the hub boundary.

use task_daemon_core::error::TaskError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HubError>;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Task(#[from] TaskError),
}

impl HubError {
    /// The stable kind name carried in `error.name` on the wire, matching
    /// [`TaskError::name`]'s convention.
    pub fn name(&self) -> &'static str {
        match self {
            HubError::UnknownCommand(_) => "UnknownCommand",
            HubError::UnknownEnvironment(_) => "UnknownEnvironment",
            HubError::MalformedRequest(_) => "MalformedRequest",
            HubError::Task(e) => e.name(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, HubError::Task(e) if e.is_fatal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_errors_delegate_their_name() {
        let err = HubError::Task(TaskError::not_found_id("t1"));
        assert_eq!(err.name(), "NotFound");
    }

    #[test]
    fn own_variants_have_stable_names() {
        assert_eq!(HubError::UnknownCommand("x".into()).name(), "UnknownCommand");
        assert_eq!(HubError::UnknownEnvironment("x".into()).name(), "UnknownEnvironment");
    }
}
