//! Signal and process-exit integration for held locks.
//!
//! A process killed by SIGINT or SIGTERM must not leave its lock files
//! behind. While a lock is held, its path sits in a fixed-slot global
//! registry whose entries are plain NUL-terminated byte buffers, so the
//! signal handler can walk it and `unlink(2)` every registered path without
//! taking any lock or allocating. After cleanup the handler restores the
//! disposition the process had before any lock was acquired and re-raises,
//! so the default OS behavior (or a pre-existing application handler) still
//! runs.
//!
//! Orderly release restores the dispositions saved at its own acquire,
//! which nests correctly when locks are released in reverse acquisition
//! order. A one-shot `atexit(3)` hook covers scopes abandoned without a
//! clean release; released locks have already vacated their registry slot,
//! so the hook is a no-op for them.
//!
//! Uncatchable termination (SIGKILL) still leaks the lock file; the next
//! same-host contender reclaims it once the PID is observed dead.

#[cfg(unix)]
pub(crate) use unix::{
    SavedDispositions, ensure_exit_cleanup, install_handlers, register_path, restore_handlers,
    unregister_path,
};

#[cfg(not(unix))]
pub(crate) use fallback::{
    SavedDispositions, ensure_exit_cleanup, install_handlers, register_path, restore_handlers,
    unregister_path,
};

#[cfg(unix)]
mod unix {
    use std::cell::UnsafeCell;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
    use std::sync::{Mutex, Once};
    use tracing::warn;

    /// Maximum number of simultaneously held locks covered by crash cleanup.
    const MAX_SLOTS: usize = 64;

    /// Slot buffer size, including the trailing NUL.
    const SLOT_CAP: usize = 4096;

    const SLOT_FREE: u8 = 0;
    const SLOT_CLAIMED: u8 = 1;
    const SLOT_ACTIVE: u8 = 2;

    /// One registry entry. The buffer holds a NUL-terminated path and is
    /// only written between the free->claimed and claimed->active
    /// transitions, so any reader that observed `SLOT_ACTIVE` sees a
    /// complete path.
    struct PathSlot {
        state: AtomicU8,
        buf: UnsafeCell<[u8; SLOT_CAP]>,
    }

    // Safety: buf is only mutated by the thread that won the free->claimed
    // CAS, and readers gate on the active state with Acquire ordering.
    unsafe impl Sync for PathSlot {}

    impl PathSlot {
        const fn new() -> Self {
            Self {
                state: AtomicU8::new(SLOT_FREE),
                buf: UnsafeCell::new([0u8; SLOT_CAP]),
            }
        }
    }

    static SLOTS: [PathSlot; MAX_SLOTS] = [const { PathSlot::new() }; MAX_SLOTS];

    /// Dispositions in effect before the first handler install, re-raised
    /// into by the handler after cleanup. Written once under INSTALL_DEPTH.
    static ORIG_INT: AtomicUsize = AtomicUsize::new(libc::SIG_DFL as usize);
    static ORIG_TERM: AtomicUsize = AtomicUsize::new(libc::SIG_DFL as usize);

    /// Count of live installs, guarding the first-install capture above.
    static INSTALL_DEPTH: Mutex<usize> = Mutex::new(0);

    static ATEXIT_ONCE: Once = Once::new();

    /// Signal dispositions saved by one lock's install, restored on its
    /// release.
    pub(crate) struct SavedDispositions {
        int: libc::sigaction,
        term: libc::sigaction,
    }

    /// Register a held lock path for crash cleanup. Returns the slot index,
    /// or `None` when the registry is full or the path does not fit; the
    /// lock still works, it just is not covered by signal/exit cleanup.
    pub(crate) fn register_path(path: &Path) -> Option<usize> {
        let bytes = path.as_os_str().as_bytes();
        if bytes.len() >= SLOT_CAP {
            warn!(
                path = %path.display(),
                "lock path too long for crash-cleanup registry; \
                 signal cleanup disabled for this lock"
            );
            return None;
        }

        for (idx, slot) in SLOTS.iter().enumerate() {
            if slot
                .state
                .compare_exchange(SLOT_FREE, SLOT_CLAIMED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                unsafe {
                    let buf = &mut *slot.buf.get();
                    buf[..bytes.len()].copy_from_slice(bytes);
                    buf[bytes.len()] = 0;
                }
                slot.state.store(SLOT_ACTIVE, Ordering::Release);
                return Some(idx);
            }
        }

        warn!(
            path = %path.display(),
            "crash-cleanup registry full ({MAX_SLOTS} locks held); \
             signal cleanup disabled for this lock"
        );
        None
    }

    /// Vacate a registry slot once the lock file has been removed.
    pub(crate) fn unregister_path(idx: usize) {
        SLOTS[idx].state.store(SLOT_FREE, Ordering::Release);
    }

    /// Unlink every registered lock path. Async-signal-safe: no locking, no
    /// allocation, only `unlink(2)`. Already-gone files are ignored.
    fn unlink_registered() {
        for slot in &SLOTS {
            if slot.state.load(Ordering::Acquire) == SLOT_ACTIVE {
                unsafe {
                    libc::unlink(slot.buf.get().cast::<libc::c_char>());
                }
            }
        }
    }

    extern "C" fn termination_handler(sig: libc::c_int) {
        unlink_registered();

        let orig = if sig == libc::SIGINT {
            ORIG_INT.load(Ordering::SeqCst)
        } else {
            ORIG_TERM.load(Ordering::SeqCst)
        };

        // Restore the pre-lock disposition and re-raise so termination (or
        // a pre-existing application handler) proceeds as it would have.
        unsafe {
            libc::signal(sig, orig as libc::sighandler_t);
            libc::raise(sig);
        }
    }

    extern "C" fn exit_cleanup() {
        unlink_registered();
    }

    /// Install the atexit cleanup hook once per process.
    pub(crate) fn ensure_exit_cleanup() {
        ATEXIT_ONCE.call_once(|| unsafe {
            libc::atexit(exit_cleanup);
        });
    }

    fn install_one(sig: libc::c_int) -> libc::sigaction {
        let mut new: libc::sigaction = unsafe { std::mem::zeroed() };
        new.sa_sigaction =
            termination_handler as extern "C" fn(libc::c_int) as libc::sighandler_t;
        new.sa_flags = 0;
        let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
        unsafe {
            libc::sigemptyset(&mut new.sa_mask);
            libc::sigaction(sig, &new, &mut old);
        }
        old
    }

    /// Install the SIGINT/SIGTERM handlers, saving the dispositions in
    /// effect so the caller can restore them on release. The first install
    /// also records the process-original dispositions the handler chains
    /// into.
    pub(crate) fn install_handlers() -> SavedDispositions {
        let mut depth = INSTALL_DEPTH.lock().unwrap_or_else(|e| e.into_inner());

        let int = install_one(libc::SIGINT);
        let term = install_one(libc::SIGTERM);

        if *depth == 0 {
            ORIG_INT.store(int.sa_sigaction, Ordering::SeqCst);
            ORIG_TERM.store(term.sa_sigaction, Ordering::SeqCst);
        }
        *depth += 1;

        SavedDispositions { int, term }
    }

    /// Restore the dispositions saved by a matching [`install_handlers`].
    pub(crate) fn restore_handlers(saved: &SavedDispositions) {
        let mut depth = INSTALL_DEPTH.lock().unwrap_or_else(|e| e.into_inner());

        unsafe {
            libc::sigaction(libc::SIGINT, &saved.int, std::ptr::null_mut());
            libc::sigaction(libc::SIGTERM, &saved.term, std::ptr::null_mut());
        }
        *depth = depth.saturating_sub(1);
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serial_test::serial;

        #[test]
        #[serial]
        fn register_unregister_cycles_slots() {
            let path = Path::new("/tmp/pathlock-signals-test.pid");
            let idx = register_path(path).unwrap();
            assert_eq!(SLOTS[idx].state.load(Ordering::Acquire), SLOT_ACTIVE);
            unregister_path(idx);
            assert_eq!(SLOTS[idx].state.load(Ordering::Acquire), SLOT_FREE);
        }

        #[test]
        #[serial]
        fn overlong_path_is_refused() {
            let long = "x".repeat(SLOT_CAP);
            assert!(register_path(Path::new(&long)).is_none());
        }

        #[test]
        #[serial]
        fn unlink_registered_removes_files_and_ignores_missing() {
            let dir = tempfile::tempdir().unwrap();
            let present = dir.path().join("held.pid");
            let missing = dir.path().join("gone.pid");
            std::fs::write(&present, b"1").unwrap();

            let a = register_path(&present).unwrap();
            let b = register_path(&missing).unwrap();
            unlink_registered();
            unregister_path(a);
            unregister_path(b);

            assert!(!present.exists());
        }

        #[test]
        #[serial]
        fn install_restore_balances_depth() {
            let before = *INSTALL_DEPTH.lock().unwrap_or_else(|e| e.into_inner());
            let outer = install_handlers();
            let inner = install_handlers();
            restore_handlers(&inner);
            restore_handlers(&outer);
            let after = *INSTALL_DEPTH.lock().unwrap_or_else(|e| e.into_inner());
            assert_eq!(before, after);
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use std::path::Path;

    /// No-op stand-in on platforms without POSIX signals.
    pub(crate) struct SavedDispositions;

    pub(crate) fn register_path(_path: &Path) -> Option<usize> {
        None
    }

    pub(crate) fn unregister_path(_idx: usize) {}

    pub(crate) fn ensure_exit_cleanup() {}

    pub(crate) fn install_handlers() -> SavedDispositions {
        SavedDispositions
    }

    pub(crate) fn restore_handlers(_saved: &SavedDispositions) {}
}
