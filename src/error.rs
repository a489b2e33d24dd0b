//! Error types for pathlock.
//!
//! Uses thiserror for derive macros and keeps messages user-actionable.
//!
//! Transient contention races (a competing lock file vanishing between the
//! directory scan and the stat or delete that follows) are expected under
//! normal operation and are swallowed at the call site; they never surface
//! through this type. There is deliberately no timeout variant: waiting
//! indefinitely for contention to clear is documented behavior, not an error.

use thiserror::Error;

/// Main error type for lock operations.
#[derive(Error, Debug)]
pub enum LockError {
    /// The parent directory of the target path could not be created.
    #[error("failed to prepare lock directory: {0}")]
    Directory(String),

    /// The lock file could not be created, written, or synced.
    #[error("failed to create lock file: {0}")]
    Create(String),

    /// The arbitration scan could not read the lock directory.
    #[error("failed to scan for competing locks: {0}")]
    Scan(String),

    /// The lock file could not be removed on explicit release.
    #[error("failed to release lock: {0}")]
    Release(String),
}

/// Result type alias for lock operations.
pub type Result<T> = std::result::Result<T, LockError>;
