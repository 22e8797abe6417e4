//! The Store contract.

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{NewTask, Task, TaskFilter, UpdateTask},
};

/// Summary counters exposed by `get_daemon_status`-adjacent introspection.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RepositoryStats {
    pub total_tasks: u64,
    pub by_status: std::collections::HashMap<String, u64>,
    pub by_priority: std::collections::HashMap<String, u64>,
}

/// Durable, ordered mapping from task id to [`Task`] with exclusive
/// single-writer access per environment.
///
/// `open` is deliberately not part of this trait: opening is
/// implementation-specific (a file path, a connection string) and is
/// exposed by each concrete Store's own constructor instead, returning
/// [`crate::error::TaskError::LockHeld`] on contention.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts a brand-new Task. Callers must have already run the
    /// Dependency Engine's validation; `create` does not re-validate.
    async fn create(&self, new: NewTask) -> Result<Task>;

    /// Replaces a full [`Task`] record by id. Used by callers that have
    /// already computed the merged value (dependency validation, partial
    /// update merges). Fails with `NotFound` if the id is absent.
    async fn put(&self, task: Task) -> Result<Task>;

    /// Fails with `NotFound` when the id is absent; other failures surface
    /// as `Database`/`Unknown`.
    async fn get(&self, id: &str) -> Result<Task>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Returns a finite, ordered snapshot of every Task. Any internal
    /// iterator/cursor resource is released before this returns, on every
    /// exit path including errors.
    async fn scan(&self) -> Result<Vec<Task>>;

    /// Convenience filter built on top of [`Store::scan`].
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let all = self.scan().await?;
        Ok(all.into_iter().filter(|t| filter.matches(t)).collect())
    }

    async fn health_check(&self) -> Result<()>;

    async fn get_stats(&self) -> Result<RepositoryStats>;
}

/// Convenience alias so callers that only need read/write access to a
/// single Task don't have to name [`UpdateTask`] merge logic themselves;
/// implemented in `storage` on top of [`Store::get`] + [`Store::put`].
#[async_trait]
pub trait StoreExt: Store {
    async fn apply_update(&self, id: &str, update: UpdateTask, now: chrono::DateTime<chrono::Utc>) -> Result<Task> {
        let mut task = self.get(id).await?;
        if let Some(title) = update.title {
            task.title = title;
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(task_type) = update.task_type {
            task.task_type = task_type;
        }
        if let Some(dependencies) = update.dependencies {
            task.dependencies = dependencies;
        }
        if update.assigned_to.is_some() {
            task.assigned_to = update.assigned_to;
        }
        if let Some(collaborators) = update.collaborators {
            task.collaborators = collaborators;
        }
        if let Some(watchers) = update.watchers {
            task.watchers = watchers;
        }
        task.updated_at = now;
        self.put(task).await
    }
}

impl<T: Store + ?Sized> StoreExt for T {}
