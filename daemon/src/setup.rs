//! Environment Registry startup sequence: open a Store and
//! Audit Log per configured environment behind an exclusive
//! [`EnvironmentLock`], then assemble the [`EnvironmentRegistry`]. The same
//! "open storage, migrate, hand back a ready handle" shape repeats once per
//! configured environment.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use task_daemon_core::error::TaskError;
use task_daemon_hub::registry::{EnvServices, EnvironmentRegistry};
use task_daemon_storage::{EnvironmentLock, FileAuditLog, SqliteStore};
use tracing::{info, warn};

use crate::config::Config;

/// What startup found for one configured environment: either the lock
/// and services were acquired, or another instance already owns the
/// directory.
pub enum EnvironmentOutcome {
    Ready { name: String, services: Arc<EnvServices>, lock: EnvironmentLock },
    LockHeld { name: String },
}

/// Opens every configured environment's Store and Audit Log. Returns
/// `Ok(None)` if any environment reports `LockHeld`; the caller is expected to exit cleanly in that case.
pub async fn open_environments(config: &Config) -> Result<Option<(EnvironmentRegistry, Vec<EnvironmentLock>)>> {
    let mut outcomes = Vec::new();
    for name in &config.daemon.environments {
        outcomes.push(open_one_environment(config, name).await?);
    }

    if let Some(held) = outcomes.iter().find_map(|o| match o {
        EnvironmentOutcome::LockHeld { name } => Some(name.clone()),
        EnvironmentOutcome::Ready { .. } => None,
    }) {
        warn!(environment = %held, "environment directory is locked by another daemon instance");
        return Ok(None);
    }

    let mut locks = Vec::new();
    let mut environments = HashMap::new();
    for outcome in outcomes {
        if let EnvironmentOutcome::Ready { name, services, lock } = outcome {
            locks.push(lock);
            environments.insert(name, services);
        }
    }

    let registry = EnvironmentRegistry::new(environments, config.daemon.default_environment.clone())
        .context("failed to build environment registry")?;
    Ok(Some((registry, locks)))
}

async fn open_one_environment(config: &Config, name: &str) -> Result<EnvironmentOutcome> {
    let env_dir = config.environment_dir(name);
    std::fs::create_dir_all(&env_dir)
        .with_context(|| format!("failed to create environment directory: {}", env_dir.display()))?;

    let lock = match EnvironmentLock::acquire(&env_dir) {
        Ok(lock) => lock,
        Err(TaskError::LockHeld(_)) => return Ok(EnvironmentOutcome::LockHeld { name: name.to_string() }),
        Err(e) => return Err(e.into()),
    };

    let database_url = format!("sqlite://{}", database_path(&env_dir).display());
    info!(environment = %name, database_url = %database_url, "opening environment store");

    let store = SqliteStore::new(&database_url).await.context("failed to open sqlite store")?;
    store.migrate().await.context("failed to run database migrations")?;
    let audit = FileAuditLog::new(&env_dir).context("failed to open audit log")?;

    let services = EnvServices::new(name, Arc::new(store), Arc::new(audit));
    Ok(EnvironmentOutcome::Ready { name: name.to_string(), services, lock })
}

fn database_path(env_dir: &Path) -> std::path::PathBuf {
    env_dir.join("tasks.sqlite")
}
