//! Task Daemon Storage
//!
//! Concrete, on-disk implementations of the `task-daemon-core` traits: a
//! SQLite-backed [`Store`](task_daemon_core::repository::Store) and a
//! JSON-lines [`AuditLog`](task_daemon_core::audit::AuditLog), plus the
//! per-environment exclusive [`EnvironmentLock`]. Nothing here is shared
//! across environments; each environment directory gets its own pool,
//! journal file, and lock.

pub mod audit_log;
pub mod lock;
pub mod sqlite_store;

pub use audit_log::FileAuditLog;
pub use lock::EnvironmentLock;
pub use sqlite_store::SqliteStore;
