//! Pathlock: cross-process advisory file locking with queued arbitration
//! and dead-holder reclamation.
//!
//! The filesystem is the only coordination medium, so the lock works across
//! independent processes and across hosts sharing a filesystem (NFS
//! included). Each contender for a target path creates one marker file next
//! to it, named `<basename>.lock.<hostname>.<pid>.<32-hex-token>.pid` and
//! containing its decimal PID; ownership belongs to the contender whose
//! marker is oldest by mtime, tie-broken by full-path ordering. Waiters
//! poll at a configurable interval, since no portable filesystem primitive
//! offers a blocking wait.
//!
//! # Example
//!
//! ```no_run
//! use pathlock::FileLock;
//!
//! let lock = FileLock::new("/shared/data/state.json");
//! let guard = lock.acquire()?;
//! // ... exclusive critical section over /shared/data/state.json ...
//! drop(guard); // or guard.release()? to surface errors
//! # Ok::<(), pathlock::LockError>(())
//! ```
//!
//! # Robustness and documented gaps
//!
//! - A holder killed by SIGINT/SIGTERM removes its marker in the signal
//!   handler before re-raising; an `atexit` hook covers abandoned scopes.
//! - A holder killed uncatchably (SIGKILL) leaks its marker until a
//!   contender on the *same* host observes the PID dead and reclaims it.
//! - A dead holder on a *different* host is never reclaimed automatically:
//!   PID liveness can only be checked locally.
//! - A live-but-hung holder blocks contenders forever; there is no
//!   timeout, by design.
//! - [`MultiFileLock`] acquires in caller order and does not prevent
//!   cross-caller ordering deadlocks; supply a consistent order (such as
//!   sorted paths) when multiple callers share path sets.

pub mod error;
mod lock;
mod multi;

pub use error::{LockError, Result};
pub use lock::{
    DEFAULT_INTERVAL, FileLock, LockConfig, LockGuard, ProcessTable, SystemProcessTable,
};
pub use multi::{MultiFileLock, MultiLockGuard};
