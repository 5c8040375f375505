//! Advisory lock files for appenders.
//!
//! Appending to a file takes `<file>.lock`, created exclusively. A second
//! appender finds it and fails with [`SddsError::Locked`]. The lock file is
//! removed when the guard is released or dropped.

use crate::error::{IoContext, Result, SddsError};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Held lock on a data file.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
    released: bool,
}

/// Sidecar path guarding `path`.
#[must_use]
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// True if another appender holds `path`.
#[must_use]
pub fn file_is_locked(path: impl AsRef<Path>) -> bool {
    lock_path_for(path.as_ref()).exists()
}

/// Remove a stale lock left by a crashed appender.
pub fn break_lock(path: impl AsRef<Path>) -> Result<bool> {
    let lock = lock_path_for(path.as_ref());
    match std::fs::remove_file(&lock) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(SddsError::io(format!("remove {}", lock.display()), e)),
    }
}

impl FileLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let lock_path = lock_path_for(path);
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SddsError::locked(path.display().to_string()));
            }
            Err(e) => return Err(SddsError::io(format!("create {}", lock_path.display()), e)),
        };
        writeln!(file, "{}", std::process::id())
            .io_context(|| format!("write {}", lock_path.display()))?;
        tracing::debug!(lock = %lock_path.display(), "acquired append lock");
        Ok(Self {
            lock_path,
            released: false,
        })
    }

    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.lock_path)
            .io_context(|| format!("remove {}", self.lock_path.display()))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("run.sdds");
        let lock = FileLock::acquire(&data).unwrap();
        assert!(file_is_locked(&data));
        let err = FileLock::acquire(&data).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Locked);
        lock.release().unwrap();
        assert!(!file_is_locked(&data));
        drop(FileLock::acquire(&data).unwrap());
        assert!(!file_is_locked(&data));
    }

    #[test]
    fn stale_locks_can_be_broken() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("run.sdds");
        std::fs::write(lock_path_for(&data), "12345\n").unwrap();
        assert!(break_lock(&data).unwrap());
        assert!(!break_lock(&data).unwrap());
        assert_eq!(lock_path_for(&data), dir.path().join("run.sdds.lock"));
    }
}
