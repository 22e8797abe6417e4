//! SQLite-backed [`Store`] implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteJournalMode, Row, Sqlite, SqlitePool};
use std::collections::HashMap;

use task_daemon_core::{
    error::{Result, TaskError},
    graph,
    models::{NewTask, Task, TaskStatus},
    repository::{RepositoryStats, Store},
};

/// SQLite implementation of [`Store`]. Connection setup mirrors the
/// teacher's `SqliteTaskRepository::new`: WAL mode for file-backed
/// databases, a shorter-lived Memory mode for `:memory:`, a busy timeout
/// so concurrent readers don't immediately error, and foreign keys on.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") || database_url.starts_with("sqlite://") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            Sqlite::create_database(&db_url)
                .await
                .map_err(|e| TaskError::Database(format!("failed to create database: {e}")))?;
        }

        let connect_options = if db_url.contains(":memory:") {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(connect_options)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| TaskError::Database(format!("migration failed: {e}")))?;
        tracing::info!("store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn scan_raw(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query("SELECT payload FROM tasks ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.iter()
            .map(|row| {
                let payload: String = row.get("payload");
                decode_task(&payload)
            })
            .collect()
    }
}

fn decode_task(payload: &str) -> Result<Task> {
    serde_json::from_str(payload).map_err(|e| TaskError::Database(format!("corrupt task payload: {e}")))
}

fn encode_task(task: &Task) -> Result<String> {
    serde_json::to_string(task).map_err(|e| TaskError::Database(format!("failed to encode task: {e}")))
}

fn map_sqlx_error(err: sqlx::Error) -> TaskError {
    TaskError::Database(err.to_string())
}

#[async_trait]
impl Store for SqliteStore {
    async fn create(&self, new: NewTask) -> Result<Task> {
        let now = Utc::now();
        let task = Task::from_new(new, now);

        // validate against the set this write would produce
        let mut candidate = self.scan_raw().await?;
        for dep in &task.dependencies {
            if dep == &task.id {
                return Err(TaskError::self_dependency(&task.id));
            }
            if !candidate.iter().any(|t| &t.id == dep) {
                return Err(TaskError::dependency_missing(&task.id, dep.clone()));
            }
        }
        candidate.push(task.clone());
        graph::check_write_would_cycle(&candidate)?;

        let payload = encode_task(&task)?;
        sqlx::query(
            "INSERT INTO tasks (id, payload, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&task.id)
        .bind(&payload)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(task)
    }

    async fn put(&self, task: Task) -> Result<Task> {
        self.get(&task.id).await?; // existence check; NotFound propagates

        let mut candidate: Vec<Task> = self
            .scan_raw()
            .await?
            .into_iter()
            .filter(|t| t.id != task.id)
            .collect();
        for dep in &task.dependencies {
            if dep == &task.id {
                return Err(TaskError::self_dependency(&task.id));
            }
            if !candidate.iter().any(|t| &t.id == dep) {
                return Err(TaskError::dependency_missing(&task.id, dep.clone()));
            }
        }
        candidate.push(task.clone());
        graph::check_write_would_cycle(&candidate)?;

        let payload = encode_task(&task)?;
        sqlx::query("UPDATE tasks SET payload = ?, updated_at = ? WHERE id = ?")
            .bind(&payload)
            .bind(task.updated_at)
            .bind(&task.id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(task)
    }

    async fn get(&self, id: &str) -> Result<Task> {
        let row = sqlx::query("SELECT payload FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        match row {
            Some(row) => {
                let payload: String = row.get("payload");
                decode_task(&payload)
            }
            None => Err(TaskError::not_found_id(id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        // existence check first so a second delete is NotFound, not a
        // silent no-op.
        self.get(id).await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Task>> {
        self.scan_raw().await
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_stats(&self) -> Result<RepositoryStats> {
        let tasks = self.scan_raw().await?;
        let mut by_status = HashMap::new();
        let mut by_priority = HashMap::new();
        for task in &tasks {
            *by_status.entry(task.status.to_string()).or_insert(0u64) += 1;
            *by_priority.entry(task.priority.to_string()).or_insert(0u64) += 1;
        }
        Ok(RepositoryStats {
            total_tasks: tasks.len() as u64,
            by_status,
            by_priority,
        })
    }
}

/// Used by `update_task_status` / `update_task_priority` handlers that
/// need the previous value for event payloads without a second round
/// trip through the Store.
pub fn previous_status(task: &Task) -> TaskStatus {
    task.status
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_daemon_core::models::Priority;

    async fn test_store() -> SqliteStore {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let store = SqliteStore::new(&format!(":memory:test_{timestamp}")).await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn create_then_get_returns_equal_task() {
        let store = test_store().await;
        let created = store
            .create(NewTask {
                title: "A".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let fetched = store.get(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, created.title);
    }

    #[tokio::test]
    async fn get_missing_id_returns_not_found() {
        let store = test_store().await;
        let err = store.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_with_missing_dependency_is_rejected() {
        let store = test_store().await;
        let err = store
            .create(NewTask {
                title: "A".to_string(),
                dependencies: Some(["missing".to_string()].into_iter().collect()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.name(), "DependencyMissing");
    }

    #[tokio::test]
    async fn s1_create_two_tasks_and_scan_in_topological_order() {
        let store = test_store().await;
        let t1 = store
            .create(NewTask {
                title: "A".to_string(),
                priority: Some(Priority::High),
                ..Default::default()
            })
            .await
            .unwrap();
        let t2 = store
            .create(NewTask {
                title: "B".to_string(),
                priority: Some(Priority::Medium),
                dependencies: Some([t1.id.clone()].into_iter().collect()),
                ..Default::default()
            })
            .await
            .unwrap();
        let all = store.scan().await.unwrap();
        assert_eq!(all.len(), 2);
        let order = graph::topological_sort(&all).unwrap();
        assert_eq!(order, vec![t1.id.clone(), t2.id.clone()]);
    }

    #[tokio::test]
    async fn s2_cycle_write_is_rejected_and_store_is_unchanged() {
        let store = test_store().await;
        let t1 = store
            .create(NewTask {
                title: "A".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let t2 = store
            .create(NewTask {
                title: "B".to_string(),
                dependencies: Some([t1.id.clone()].into_iter().collect()),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut t1_mut = store.get(&t1.id).await.unwrap();
        t1_mut.dependencies.insert(t2.id.clone());
        let err = store.put(t1_mut).await.unwrap_err();
        assert_eq!(err.name(), "CycleWouldForm");

        let still_t1 = store.get(&t1.id).await.unwrap();
        assert!(still_t1.dependencies.is_empty());
    }

    #[tokio::test]
    async fn delete_is_not_found_on_second_call() {
        let store = test_store().await;
        let task = store
            .create(NewTask {
                title: "A".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        store.delete(&task.id).await.unwrap();
        let err = store.delete(&task.id).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
