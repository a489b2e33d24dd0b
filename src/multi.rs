//! Composite locking over a fixed set of paths.
//!
//! [`MultiFileLock`] acquires one [`FileLock`] per path, strictly in the
//! order the caller supplied, and guarantees that any partially acquired
//! subset is released before an acquisition error propagates. Release walks
//! the set in reverse acquisition order and attempts every lock even when
//! one fails.
//!
//! # Ordering hazard
//!
//! Acquisition order is *as given by the caller*. Two callers locking the
//! same two paths in opposite orders can deadlock each other, each waiting
//! on the lock the other holds. This composition does not solve that;
//! callers needing cross-caller safety must agree on a global order, for
//! example by sorting the paths before constructing the lock.

use crate::error::{LockError, Result};
use crate::lock::{FileLock, LockConfig, LockGuard};
use std::path::{Path, PathBuf};

/// Exclusive access to a fixed, ordered set of target paths.
pub struct MultiFileLock {
    locks: Vec<FileLock>,
}

impl MultiFileLock {
    /// Create a composite lock over `paths` with the default configuration.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::with_config(paths, LockConfig::default())
    }

    /// Create a composite lock with explicit configuration, forwarded to
    /// every member lock.
    pub fn with_config<I, P>(paths: I, config: LockConfig) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            locks: paths
                .into_iter()
                .map(|p| FileLock::with_config(p, config.clone()))
                .collect(),
        }
    }

    /// The resolved target paths, in acquisition order.
    pub fn targets(&self) -> Vec<&Path> {
        self.locks.iter().map(FileLock::target).collect()
    }

    /// Acquire every member lock in input order.
    ///
    /// If acquiring lock *k+1* fails after locks *1..k* succeeded, the
    /// acquired subset is released in reverse order before the error
    /// propagates; release failures during that unwind are logged by the
    /// guards and never mask the original error.
    pub fn acquire(&self) -> Result<MultiLockGuard> {
        let mut guards: Vec<LockGuard> = Vec::with_capacity(self.locks.len());
        let mut targets: Vec<PathBuf> = Vec::with_capacity(self.locks.len());

        for lock in &self.locks {
            match lock.acquire() {
                Ok(guard) => {
                    guards.push(guard);
                    targets.push(lock.target().to_path_buf());
                }
                Err(e) => {
                    while let Some(guard) = guards.pop() {
                        drop(guard);
                    }
                    return Err(e);
                }
            }
        }

        Ok(MultiLockGuard { guards, targets })
    }
}

impl std::fmt::Debug for MultiFileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiFileLock")
            .field("targets", &self.targets())
            .finish()
    }
}

/// RAII guard over the full acquired set.
///
/// Dropping the guard releases every member lock in reverse acquisition
/// order.
#[derive(Debug)]
pub struct MultiLockGuard {
    guards: Vec<LockGuard>,
    targets: Vec<PathBuf>,
}

impl MultiLockGuard {
    /// The resolved locked paths, in the same order as the input.
    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    /// Release every member lock explicitly, in reverse acquisition order.
    ///
    /// Every lock is attempted even if an earlier release fails; the first
    /// error is returned once all attempts are done.
    pub fn release(mut self) -> Result<()> {
        let mut first_err: Option<LockError> = None;
        while let Some(guard) = self.guards.pop() {
            if let Err(e) = guard.release()
                && first_err.is_none()
            {
                first_err = Some(e);
            }
        }
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

impl Drop for MultiLockGuard {
    fn drop(&mut self) {
        // Reverse acquisition order; LockGuard's drop handles each file.
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockConfig;
    use std::time::Duration;
    use tempfile::TempDir;

    fn quick_config() -> LockConfig {
        LockConfig {
            interval: Duration::from_millis(5),
            handle_signals: false,
        }
    }

    /// Lock files currently present for the given target.
    fn lock_files_for(dir: &Path, base: &str) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.starts_with(&format!("{base}.lock.")) && n.ends_with(".pid"))
            .collect()
    }

    #[test]
    fn acquires_and_releases_all_paths_in_order() {
        let temp = TempDir::new().unwrap();
        let paths: Vec<_> = ["a.txt", "b.txt", "c.txt"]
            .iter()
            .map(|n| temp.path().join(n))
            .collect();

        let multi = MultiFileLock::with_config(&paths, quick_config());
        let guard = multi.acquire().unwrap();

        assert_eq!(guard.targets().len(), 3);
        for (target, path) in guard.targets().iter().zip(&paths) {
            assert_eq!(target, path);
        }
        for base in ["a.txt", "b.txt", "c.txt"] {
            assert_eq!(lock_files_for(temp.path(), base).len(), 1);
        }

        drop(guard);

        for base in ["a.txt", "b.txt", "c.txt"] {
            assert!(lock_files_for(temp.path(), base).is_empty());
        }
    }

    #[test]
    fn partial_failure_rolls_back_acquired_locks() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("a.txt");
        let second = temp.path().join("b.txt");

        // The third path's parent is a regular file, so create_dir_all
        // fails and acquisition of the third lock errors out.
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, b"plain file").unwrap();
        let third = blocker.join("c.txt");

        let multi = MultiFileLock::with_config([&first, &second, &third], quick_config());
        let err = multi.acquire().unwrap_err();
        assert!(matches!(err, LockError::Directory(_)));

        // No leaked lock files for the paths that did get acquired.
        assert!(lock_files_for(temp.path(), "a.txt").is_empty());
        assert!(lock_files_for(temp.path(), "b.txt").is_empty());
    }

    #[test]
    fn explicit_release_reports_success() {
        let temp = TempDir::new().unwrap();
        let paths = [temp.path().join("x"), temp.path().join("y")];

        let multi = MultiFileLock::with_config(&paths, quick_config());
        let guard = multi.acquire().unwrap();
        guard.release().unwrap();

        assert!(lock_files_for(temp.path(), "x").is_empty());
        assert!(lock_files_for(temp.path(), "y").is_empty());
    }

    #[test]
    fn targets_are_resolved_before_acquisition() {
        let temp = TempDir::new().unwrap();
        let messy = temp.path().join("sub").join("..").join("x.txt");
        let multi = MultiFileLock::new([&messy]);
        assert_eq!(multi.targets()[0], temp.path().join("x.txt"));
    }

    #[test]
    fn empty_path_set_is_a_no_op() {
        let multi = MultiFileLock::new(Vec::<PathBuf>::new());
        let guard = multi.acquire().unwrap();
        assert!(guard.targets().is_empty());
        guard.release().unwrap();
    }
}
