//! Lock construction and the acquire path: exclusive lock-file creation,
//! signal integration, and the mtime-ordered arbitration loop.

use super::guard::LockGuard;
use super::name;
use super::process::{ProcessTable, SystemProcessTable};
use super::signals;
use super::types::LockConfig;
use crate::error::{LockError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Cross-process mutual exclusion keyed by a filesystem path.
///
/// The target path need not exist; the lock protects the *name*. Every
/// contender drops one marker file next to the target (see
/// [`lock::name`](super::name) for the format) and the contender whose
/// marker is oldest by mtime, tie-broken by full-path ordering, holds the
/// lock. Waiters poll at [`LockConfig::interval`] until everything ahead of
/// them has released.
///
/// There is no timeout: a contender waits indefinitely while live
/// competitors hold precedence. Lock files abandoned by dead processes on
/// the *same* host are detected through the process table and reclaimed by
/// whichever waiter notices them first; dead holders on other hosts can
/// never be verified dead and their files are never touched.
pub struct FileLock {
    /// Absolute, lexically normalized target path.
    target: PathBuf,

    config: LockConfig,

    /// Liveness oracle for same-host PIDs; swappable for tests.
    process_table: Arc<dyn ProcessTable>,
}

impl FileLock {
    /// Create a lock for `path` with the default configuration.
    ///
    /// The path is resolved to an absolute, lexically normalized form at
    /// construction, so all processes passing equivalent paths agree on the
    /// lock-file naming. Symlinks are not resolved (the target may not
    /// exist yet); callers that reach the target through different symlinks
    /// should pre-canonicalize.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self::with_config(path, LockConfig::default())
    }

    /// Create a lock with explicit configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: LockConfig) -> Self {
        Self::with_process_table(path, config, Arc::new(SystemProcessTable))
    }

    /// Create a lock with an injected process table.
    ///
    /// Intended for tests and embedders with their own liveness source;
    /// everything else behaves as [`FileLock::with_config`].
    pub fn with_process_table<P: AsRef<Path>>(
        path: P,
        config: LockConfig,
        process_table: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            target: absolutize(path.as_ref()),
            config,
            process_table,
        }
    }

    /// The resolved target path this lock protects.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Block until this process holds the lock, returning the guard that
    /// releases it.
    ///
    /// Creates the parent directory if missing, drops this process's marker
    /// file, installs the signal/exit cleanup (unless disabled in the
    /// config), then polls until no live contender is ahead.
    pub fn acquire(&self) -> Result<LockGuard> {
        let parent = self.target.parent().unwrap_or(Path::new("/"));
        fs::create_dir_all(parent)
            .map_err(|e| LockError::Directory(format!("'{}': {}", parent.display(), e)))?;

        let base = self
            .target
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| {
                LockError::Create(format!(
                    "target '{}' has no filename component",
                    self.target.display()
                ))
            })?;

        let host = name::local_hostname();
        let lock_path = self.create_lock_file(parent, &base, &host)?;

        // Wire up crash cleanup before entering the wait, so an interrupt
        // delivered mid-wait still removes our queue entry.
        let (slot, saved) = if self.config.handle_signals {
            signals::ensure_exit_cleanup();
            let slot = signals::register_path(&lock_path);
            (slot, Some(signals::install_handlers()))
        } else {
            (None, None)
        };

        // From here on the guard owns cleanup on every exit path.
        let guard = LockGuard::new(lock_path.clone(), slot, saved);

        let own_mtime = fs::metadata(&lock_path)
            .and_then(|m| m.modified())
            .map_err(|e| LockError::Create(format!("'{}': {}", lock_path.display(), e)))?;

        loop {
            if !self.someone_ahead(parent, &base, &host, &lock_path, own_mtime)? {
                debug!(
                    target_path = %self.target.display(),
                    lock_file = %lock_path.display(),
                    "lock acquired"
                );
                return Ok(guard);
            }
            std::thread::sleep(self.config.interval);
        }
    }

    /// Exclusively create this process's marker file containing its decimal
    /// PID. A name collision (128 random bits colliding) is handled by
    /// regenerating the token, not by waiting: this loop is
    /// collision-avoidance, never contention arbitration.
    fn create_lock_file(&self, parent: &Path, base: &str, host: &str) -> Result<PathBuf> {
        let pid = std::process::id();
        let (lock_path, mut file) = loop {
            let candidate =
                parent.join(name::lock_file_name(base, host, pid, &name::random_token()));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(f) => break (candidate, f),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(LockError::Create(format!(
                        "'{}': {}",
                        candidate.display(),
                        e
                    )));
                }
            }
        };

        let write_result = file
            .write_all(pid.to_string().as_bytes())
            .and_then(|()| file.sync_all());
        if let Err(e) = write_result {
            // Don't leave a half-written queue entry behind.
            let _ = fs::remove_file(&lock_path);
            return Err(LockError::Create(format!(
                "'{}': {}",
                lock_path.display(),
                e
            )));
        }

        Ok(lock_path)
    }

    /// One arbitration pass: scan sibling lock files and decide whether any
    /// live contender precedes ours.
    ///
    /// A candidate is ahead when its mtime is strictly earlier than ours,
    /// or the mtimes are equal and its full path sorts before ours. A
    /// same-host candidate whose PID is dead is deleted and never counted.
    /// Candidates that vanish mid-scan are the normal signature of a
    /// release racing us and are skipped silently.
    fn someone_ahead(
        &self,
        dir: &Path,
        base: &str,
        host: &str,
        own_path: &Path,
        own_mtime: SystemTime,
    ) -> Result<bool> {
        let entries = fs::read_dir(dir)
            .map_err(|e| LockError::Scan(format!("'{}': {}", dir.display(), e)))?;

        for entry in entries {
            let entry = entry
                .map_err(|e| LockError::Scan(format!("'{}': {}", dir.display(), e)))?;

            let file_name = entry.file_name();
            let Some(fname) = file_name.to_str() else {
                continue;
            };
            if !name::is_candidate(fname, base) {
                continue;
            }

            let path = entry.path();
            if path == own_path {
                // Our own entry never counts as ahead of itself.
                continue;
            }

            let Some(parsed) = name::parse_lock_name(fname) else {
                debug!(file = fname, "ignoring malformed lock filename");
                continue;
            };

            if parsed.hostname == host && !self.process_table.is_alive(parsed.pid) {
                warn!(
                    path = %path.display(),
                    pid = parsed.pid,
                    "reclaiming lock file abandoned by dead process"
                );
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(LockError::Scan(format!(
                            "deleting stale lock '{}': {}",
                            path.display(),
                            e
                        )));
                    }
                }
                continue;
            }

            let mtime = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(LockError::Scan(format!(
                        "'{}': {}",
                        path.display(),
                        e
                    )));
                }
            };

            if mtime < own_mtime
                || (mtime == own_mtime && path.as_os_str() < own_path.as_os_str())
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("target", &self.target)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Make a path absolute against the current directory and lexically fold
/// `.` and `..` components. The filesystem is not consulted: the target
/// (and even its parent) may not exist yet.
fn absolutize(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolutize_folds_dot_components() {
        assert_eq!(absolutize(Path::new("/a/b/./c")), PathBuf::from("/a/b/c"));
        assert_eq!(absolutize(Path::new("/a/b/../c")), PathBuf::from("/a/c"));
        assert_eq!(absolutize(Path::new("/a//b")), PathBuf::from("/a/b"));
    }

    #[test]
    fn absolutize_makes_relative_paths_absolute() {
        let resolved = absolutize(Path::new("some/file.txt"));
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("some/file.txt"));
    }

    #[test]
    fn equivalent_spellings_agree_on_the_target() {
        let a = FileLock::new("/tmp/data/./x.txt");
        let b = FileLock::new("/tmp/./data/../data/x.txt");
        assert_eq!(a.target(), b.target());
    }
}
