//! RAII lock guard implementation.

use crate::error::{LockError, Result};
use crate::lock::signals::{self, SavedDispositions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// RAII guard for a held [`FileLock`](crate::FileLock).
///
/// Dropping the guard deletes the lock file, restores the signal
/// dispositions saved at acquire time, and vacates the crash-cleanup
/// registry slot. If deletion fails during drop, a warning is logged but
/// the program does not panic.
///
/// Release is idempotent: a lock file already removed (for example by the
/// signal handler firing before an orderly exit) is not an error.
pub struct LockGuard {
    /// Path to this process's own lock file.
    path: PathBuf,

    /// Crash-cleanup registry slot, if one was available.
    slot: Option<usize>,

    /// Signal dispositions to restore on release.
    saved: Option<SavedDispositions>,

    /// Whether the lock has been released.
    released: bool,
}

impl LockGuard {
    pub(super) fn new(
        path: PathBuf,
        slot: Option<usize>,
        saved: Option<SavedDispositions>,
    ) -> Self {
        Self {
            path,
            slot,
            saved,
            released: false,
        }
    }

    /// Path of this process's own lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly, surfacing any deletion error.
    ///
    /// Useful when the caller wants to release before the guard goes out of
    /// scope and handle failure rather than have it logged on drop. An
    /// already-missing lock file is treated as success.
    pub fn release(mut self) -> Result<()> {
        self.release_inner().map_err(|e| {
            LockError::Release(format!("'{}': {}", self.path.display(), e))
        })
    }

    /// Shared release path for explicit release, drop, and double calls.
    fn release_inner(&mut self) -> std::io::Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let result = match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        };

        // Restore handlers and vacate the registry slot even if the delete
        // failed, so process-global state never leaks.
        if let Some(saved) = self.saved.take() {
            signals::restore_handlers(&saved);
        }
        if let Some(idx) = self.slot.take() {
            signals::unregister_path(idx);
        }

        result
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release lock on drop"
            );
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.path)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
