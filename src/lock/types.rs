//! Configuration types and defaults for lock acquisition.

use std::time::Duration;

/// Default polling period for the arbitration loop.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning knobs for a [`FileLock`](crate::FileLock).
///
/// The same configuration is forwarded to every member lock of a
/// [`MultiFileLock`](crate::MultiFileLock).
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Polling period of the arbitration loop.
    ///
    /// The filesystem offers no portable blocking wait, so acquisition is a
    /// sleep-and-rescan loop. A shorter interval lowers acquisition latency
    /// after the current holder releases but costs more directory scans; a
    /// longer interval does the opposite. The default of 100ms suits
    /// critical sections in the tens-of-milliseconds-and-up range.
    pub interval: Duration,

    /// Whether to install SIGINT/SIGTERM handlers that release the lock
    /// before re-raising, plus a process-exit cleanup hook.
    ///
    /// Defaults to `true`. Embedders that manage process signal
    /// dispositions themselves can set this to `false`; arbitration
    /// semantics are unchanged, but a lock file abandoned by an interrupted
    /// process then lingers until a same-host contender reclaims it.
    pub handle_signals: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            handle_signals: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LockConfig::default();
        assert_eq!(config.interval, Duration::from_millis(100));
        assert!(config.handle_signals);
    }
}
