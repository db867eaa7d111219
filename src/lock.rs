//! Exclusive lock over the shared root directory.
//!
//! Every add/del/check holds this lock for its whole body. The lock is an
//! advisory `flock` on the root directory itself, so the kernel drops it
//! when the holding process exits, however it exits.

use std::fs::File;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::error::{DnsnameError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Holds the root lock until dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Acquires the lock on `root`, creating the directory if needed.
    ///
    /// Polls a non-blocking `flock` until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`DnsnameError::LockTimeout`] if another holder keeps the
    /// lock past `timeout`, or [`DnsnameError::Io`] if the directory cannot
    /// be created or locked.
    pub fn acquire(root: &Path, timeout: Duration) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Self::acquire_existing(root, timeout)
    }

    /// Acquires the lock on an existing `root` without creating anything.
    ///
    /// # Errors
    ///
    /// As [`acquire`](Self::acquire); a missing `root` is a `NotFound`
    /// [`DnsnameError::Io`].
    pub fn acquire_existing(root: &Path, timeout: Duration) -> Result<Self> {
        let file = File::open(root)?;
        let started = Instant::now();

        loop {
            // SAFETY: the descriptor is owned by `file` and stays open for
            // the duration of the call.
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
            if rc == 0 {
                tracing::debug!(path = %root.display(), "Acquired root lock");
                return Ok(Self {
                    file,
                    path: root.to_path_buf(),
                });
            }

            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EWOULDBLOCK) {
                return Err(err.into());
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(DnsnameError::LockTimeout {
                    path: root.to_path_buf(),
                    waited,
                });
            }
            std::thread::sleep(POLL_INTERVAL.min(timeout - waited));
        }
    }

    /// Returns the locked directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // SAFETY: the descriptor is still owned by `self.file`.
        let rc = unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
        if rc == 0 {
            tracing::debug!(path = %self.path.display(), "Released root lock");
        } else {
            // Closing the descriptor right after still releases it.
            tracing::error!(
                path = %self.path.display(),
                error = %std::io::Error::last_os_error(),
                "Unable to release root lock"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dnsname");
        let guard = LockGuard::acquire(&root, Duration::from_secs(1)).unwrap();
        assert!(root.is_dir());
        assert_eq!(guard.path(), root);
    }

    #[test]
    fn acquire_existing_leaves_missing_root_alone() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("dnsname");

        let err = LockGuard::acquire_existing(&root, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, DnsnameError::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
        assert!(!root.exists());

        std::fs::create_dir(&root).unwrap();
        LockGuard::acquire_existing(&root, Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn second_holder_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let first = LockGuard::acquire(dir.path(), Duration::from_secs(1)).unwrap();

        let err = LockGuard::acquire(dir.path(), Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, DnsnameError::LockTimeout { .. }));

        drop(first);
        LockGuard::acquire(dir.path(), Duration::from_millis(100)).unwrap();
    }

    #[test]
    fn waiter_gets_lock_once_released() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let first = LockGuard::acquire(&root, Duration::from_secs(1)).unwrap();

        let waiter = {
            let root = root.clone();
            std::thread::spawn(move || LockGuard::acquire(&root, Duration::from_secs(5)).map(|_| ()))
        };
        std::thread::sleep(Duration::from_millis(100));
        drop(first);

        waiter.join().unwrap().unwrap();
    }
}
