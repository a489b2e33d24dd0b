//! Process-liveness checking.
//!
//! Arbitration needs exactly one OS collaborator: "does a process with PID
//! *p* exist on this host". It is modeled as a trait so tests can fake dead
//! processes without killing real ones.

/// Capability to query the local process table.
pub trait ProcessTable: Send + Sync {
    /// Whether a process with the given PID currently exists on this host.
    fn is_alive(&self, pid: u32) -> bool;
}

/// The real local process table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

#[cfg(unix)]
impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, pid: u32) -> bool {
        // kill(pid, 0) checks existence without sending a signal:
        // 0 means the process exists; ESRCH means it does not; EPERM means
        // it exists but belongs to another user, which still counts.
        let rc = unsafe { libc::kill(pid as i32, 0) };
        if rc == 0 {
            true
        } else {
            matches!(
                std::io::Error::last_os_error().raw_os_error(),
                Some(code) if code == libc::EPERM
            )
        }
    }
}

#[cfg(not(unix))]
impl ProcessTable for SystemProcessTable {
    fn is_alive(&self, _pid: u32) -> bool {
        // No portable liveness check; assume alive so we never delete a
        // lock file that might still be held.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(SystemProcessTable.is_alive(std::process::id()));
    }

    #[cfg(unix)]
    #[test]
    fn impossible_pid_is_not_alive() {
        // PID max on Linux is < 2^22 by default; this one cannot exist.
        assert!(!SystemProcessTable.is_alive(999_999_999));
    }
}
