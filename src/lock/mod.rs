//! Single-path locking subsystem.
//!
//! One [`FileLock`] arbitrates ownership of one target path through marker
//! files in the target's directory:
//!
//! ```text
//! <target-basename>.lock.<hostname>.<pid>.<32-hex-random-token>.pid
//! ```
//!
//! # Arbitration
//!
//! Many lock files may exist for the same target at once, one per waiting
//! or holding process; there is no single "the lock". A process holds the
//! lock exactly when its own file is the oldest (by mtime, ties broken by
//! full-path ordering) among all files whose owners are live. The file's
//! content is the owner's decimal PID, written for human debugging only;
//! arbitration never reads it back.
//!
//! # Cleanup
//!
//! Lock files are deleted on scope exit, on SIGINT/SIGTERM (the handler
//! re-raises after cleanup), at process exit via an `atexit` hook, and by
//! any *other* contender that observes the owner dead on the same host.

mod guard;
mod name;
mod operations;
mod process;
mod signals;
mod types;


pub use guard::LockGuard;
pub use operations::FileLock;
pub use process::{ProcessTable, SystemProcessTable};
pub use types::{DEFAULT_INTERVAL, LockConfig};
