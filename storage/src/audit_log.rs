//! Append-only JSON-lines [`AuditLog`]. One file per
//! environment, following the same append-only journal convention this
//! pack's job-runner daemons use for their own event logs. A failed
//! `record` call never rolls back the Store write that preceded it
//! — it only returns an error for the caller to log.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use task_daemon_core::audit::{AuditEvent, AuditFilter, AuditLog};
use task_daemon_core::error::{Result, TaskError};
use tokio::task;

/// Appends [`AuditEvent`]s as one JSON object per line to `<env_dir>/audit.jsonl`.
/// Writes are serialized behind a `std::sync::Mutex` and run on the
/// blocking thread pool; reads for `query`/`prune` re-parse the whole file,
/// which is adequate for a single-environment audit trail of this size.
pub struct FileAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileAuditLog {
    pub fn new(env_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(env_dir)
            .map_err(|e| TaskError::Unknown(format!("failed to create environment directory: {e}")))?;
        Ok(FileAuditLog {
            path: env_dir.join("audit.jsonl"),
            write_lock: Mutex::new(()),
        })
    }

    fn read_all(&self) -> Result<Vec<AuditEvent>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TaskError::Unknown(format!("failed to read audit log: {e}"))),
        };
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| TaskError::Unknown(format!("corrupt audit log line: {e}")))
            })
            .collect()
    }

    fn write_all(&self, events: &[AuditEvent]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let mut file = std::fs::File::create(&self.path)
            .map_err(|e| TaskError::Unknown(format!("failed to rewrite audit log: {e}")))?;
        for event in events {
            let line = serde_json::to_string(event)
                .map_err(|e| TaskError::Unknown(format!("failed to serialize audit event: {e}")))?;
            writeln!(file, "{line}").map_err(|e| TaskError::Unknown(format!("failed to write audit log: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let path = self.path.clone();
        let line = serde_json::to_string(&event)
            .map_err(|e| TaskError::Unknown(format!("failed to serialize audit event: {e}")))?;
        task::spawn_blocking(move || -> Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| TaskError::Unknown(format!("failed to open audit log: {e}")))?;
            writeln!(file, "{line}").map_err(|e| TaskError::Unknown(format!("failed to write audit log: {e}")))
        })
        .await
        .map_err(|e| TaskError::Unknown(format!("audit log write task panicked: {e}")))?
    }

    async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEvent>> {
        let all = self.read_all()?;
        Ok(all.into_iter().filter(|e| filter.matches(e)).collect())
    }

    async fn prune(&self, now: DateTime<Utc>, older_than: chrono::Duration) -> Result<u64> {
        let all = self.read_all()?;
        let cutoff = now - older_than;
        let (kept, pruned): (Vec<_>, Vec<_>) = all.into_iter().partition(|e| e.at >= cutoff);
        self.write_all(&kept)?;
        Ok(pruned.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use task_daemon_core::audit::AuditEventKind;

    fn event(id: &str, at: DateTime<Utc>) -> AuditEvent {
        AuditEvent {
            id: id.to_string(),
            task_id: "t1".to_string(),
            kind: AuditEventKind::Created,
            at,
            actor: "system".to_string(),
            payload: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn record_then_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path()).unwrap();
        log.record(event("1", Utc::now())).await.unwrap();
        log.record(event("2", Utc::now())).await.unwrap();
        let found = log.query(&AuditFilter::default()).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn prune_removes_entries_older_than_window() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path()).unwrap();
        let old = Utc::now() - chrono::Duration::days(40);
        log.record(event("old", old)).await.unwrap();
        log.record(event("new", Utc::now())).await.unwrap();

        let pruned = log.prune(Utc::now(), chrono::Duration::days(30)).await.unwrap();
        assert_eq!(pruned, 1);

        let remaining = log.query(&AuditFilter::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "new");
    }

    #[tokio::test]
    async fn query_on_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileAuditLog::new(dir.path()).unwrap();
        let found = log.query(&AuditFilter::default()).await.unwrap();
        assert!(found.is_empty());
    }
}
