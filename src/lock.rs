//! Single-instance scheduler for the worker daemons.
//!
//! Each worker type holds an exclusive advisory lock on a file named after
//! it. The kernel releases the lock when the file descriptor closes, so a
//! crashed or signalled worker never leaves a stale lock behind and no
//! cleanup call is required.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::errors::PatrolError;

pub struct InstanceLock {
    // Held for the lock's lifetime; closing it releases the flock.
    _file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Try to become the sole live instance of `worker_name` under `dir`.
    ///
    /// Returns `Ok(None)` when another instance already holds the lock;
    /// callers should treat that as an idempotent no-op and exit cleanly.
    /// Locks for different worker names never contend.
    pub fn acquire(dir: &Path, worker_name: &str) -> Result<Option<InstanceLock>, PatrolError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| PatrolError::Lock(format!("Failed to create lock dir: {}", e)))?;
        let path = dir.join(format!("pathpatrol-{worker_name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| PatrolError::Lock(format!("Failed to open {}: {}", path.display(), e)))?;

        match try_flock_exclusive(&file) {
            Ok(true) => Ok(Some(InstanceLock { _file: file, path })),
            Ok(false) => Ok(None),
            Err(e) => Err(PatrolError::Lock(format!(
                "flock on {} failed: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Try to acquire an exclusive flock on a file (non-blocking).
///
/// Returns `Ok(true)` if the lock was acquired, `Ok(false)` if the file is
/// already locked by another process.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: flock is a standard POSIX call. fd is a valid file
        // descriptor owned by `file`. LOCK_EX | LOCK_NB is a non-blocking
        // exclusive lock.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let first = InstanceLock::acquire(dir.path(), "network").unwrap();
        assert!(first.is_some());

        let second = InstanceLock::acquire(dir.path(), "network").unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn test_different_names_never_contend() {
        let dir = tempfile::tempdir().unwrap();
        let network = InstanceLock::acquire(dir.path(), "network").unwrap();
        let dos = InstanceLock::acquire(dir.path(), "dos").unwrap();
        assert!(network.is_some());
        assert!(dos.is_some());
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let held = InstanceLock::acquire(dir.path(), "patch").unwrap();
            assert!(held.is_some());
        }
        let again = InstanceLock::acquire(dir.path(), "patch").unwrap();
        assert!(again.is_some());
    }
}
