use thiserror::Error;

/// Result type alias used throughout `core`, `storage`, `workflow` and `hub`.
pub type Result<T> = std::result::Result<T, TaskError>;

/// Error taxonomy. `name()` mirrors the `error.name` field sent
/// over the wire so clients can branch on a stable string instead of
/// regexing `message`.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("write would form a dependency cycle: {0}")]
    CycleWouldForm(String),

    #[error("dependency {dependency} referenced by {task} does not exist")]
    DependencyMissing { task: String, dependency: String },

    #[error("task {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("store directory already owned by another process: {0}")]
    LockHeld(String),

    #[error("store is not open")]
    DatabaseNotOpen,

    #[error("agent session turn timed out after {0:?}")]
    SessionTimeout(std::time::Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl TaskError {
    pub fn not_found_id(id: impl std::fmt::Display) -> Self {
        TaskError::NotFound(id.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        TaskError::Validation(message.into())
    }

    pub fn cycle_would_form(path: impl Into<String>) -> Self {
        TaskError::CycleWouldForm(path.into())
    }

    pub fn dependency_missing(task: impl Into<String>, dependency: impl Into<String>) -> Self {
        TaskError::DependencyMissing {
            task: task.into(),
            dependency: dependency.into(),
        }
    }

    pub fn self_dependency(task: impl Into<String>) -> Self {
        TaskError::SelfDependency(task.into())
    }

    pub fn lock_held(dir: impl Into<String>) -> Self {
        TaskError::LockHeld(dir.into())
    }

    /// The stable kind name carried in `error.name` on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            TaskError::NotFound(_) => "NotFound",
            TaskError::Validation(_) => "Validation",
            TaskError::CycleWouldForm(_) => "CycleWouldForm",
            TaskError::DependencyMissing { .. } => "DependencyMissing",
            TaskError::SelfDependency(_) => "SelfDependency",
            TaskError::LockHeld(_) => "LockHeld",
            TaskError::DatabaseNotOpen => "DatabaseNotOpen",
            TaskError::SessionTimeout(_) => "SessionTimeout",
            TaskError::Transport(_) => "Transport",
            TaskError::Database(_) => "Database",
            TaskError::Unknown(_) => "Unknown",
        }
    }

    /// True for the two DB-unavailable kinds the workflow loop and the
    /// Environment Registry treat as fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::LockHeld(_) | TaskError::DatabaseNotOpen)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TaskError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TaskError::Validation(_)
                | TaskError::CycleWouldForm(_)
                | TaskError::DependencyMissing { .. }
                | TaskError::SelfDependency(_)
        )
    }

    pub fn is_database(&self) -> bool {
        matches!(self, TaskError::Database(_) | TaskError::DatabaseNotOpen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_exactly_lock_held_and_database_not_open() {
        assert!(TaskError::lock_held("/envs/default").is_fatal());
        assert!(TaskError::DatabaseNotOpen.is_fatal());
        assert!(!TaskError::not_found_id("t1").is_fatal());
        assert!(!TaskError::Transport("boom".into()).is_fatal());
    }

    #[test]
    fn names_match_wire_taxonomy() {
        assert_eq!(TaskError::cycle_would_form("t1 -> t2 -> t1").name(), "CycleWouldForm");
        assert_eq!(
            TaskError::dependency_missing("t1", "t2").name(),
            "DependencyMissing"
        );
        assert_eq!(TaskError::self_dependency("t1").name(), "SelfDependency");
    }

    #[test]
    fn validation_predicate_covers_all_validation_like_variants() {
        assert!(TaskError::validation("bad").is_validation());
        assert!(TaskError::cycle_would_form("x").is_validation());
        assert!(TaskError::dependency_missing("a", "b").is_validation());
        assert!(TaskError::self_dependency("a").is_validation());
    }
}
