//! Per-environment exclusive lock.
//!
//! SQLite's own file locking blocks a second writer rather than failing
//! fast, so "a second start attempt fails fast" is implemented one layer
//! up with a plain advisory lock file instead.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use task_daemon_core::error::{Result, TaskError};

/// Held for the daemon's lifetime; dropping it releases the OS advisory
/// lock (and, on most platforms, its removal races harmlessly with a new
/// owner creating a fresh file).
pub struct EnvironmentLock {
    _file: File,
    path: PathBuf,
}

impl EnvironmentLock {
    /// Attempts to acquire the lock at `<env_dir>/daemon.lock`, creating
    /// `env_dir` if absent. Returns [`TaskError::LockHeld`] if another
    /// process already owns it.
    pub fn acquire(env_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(env_dir)
            .map_err(|e| TaskError::Unknown(format!("failed to create environment directory: {e}")))?;
        let path = env_dir.join("daemon.lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| TaskError::Unknown(format!("failed to open lock file: {e}")))?;

        file.try_lock_exclusive()
            .map_err(|_| TaskError::lock_held(path.display().to_string()))?;

        Ok(EnvironmentLock { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_directory_fails_with_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let _first = EnvironmentLock::acquire(dir.path()).unwrap();
        let second = EnvironmentLock::acquire(dir.path());
        assert!(second.is_err());
        assert_eq!(second.unwrap_err().name(), "LockHeld");
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = EnvironmentLock::acquire(dir.path()).unwrap();
        }
        let reacquired = EnvironmentLock::acquire(dir.path());
        assert!(reacquired.is_ok());
    }
}
