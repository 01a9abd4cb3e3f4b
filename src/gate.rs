//! The global runtime gate.
//!
//! The emulation layer keeps all of its bookkeeping effectively
//! single-threaded: every public operation acquires one process-wide
//! lock on entry and holds it for the duration of the call, except for
//! the native blocking wait itself, which runs with the gate released
//! so that several real threads can each be parked in their own native
//! wait concurrently.
//!
//! The gate is a scoped guard: it is released on every exit path,
//! including early returns and panics. A per-thread sentinel turns a
//! nested acquisition into an immediate panic rather than a deadlock,
//! since mismatched enter/leave pairing is a programming error, not a
//! recoverable condition.

use std::cell::Cell;
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};

static GATE: Mutex<()> = Mutex::new(());

/// Debug-mode single-holder check: set while any thread holds the gate.
static HELD: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// Reentrancy sentinel for the current thread.
    static ENTERED: Cell<bool> = const { Cell::new(false) };
}

/// Guard representing gate ownership for one public operation.
///
/// Dropping the guard releases the gate. [`GateGuard::suspend`] opens
/// the window in which the native blocking wait is allowed to run.
pub(crate) struct GateGuard {
    inner: Option<MutexGuard<'static, ()>>,
}

/// Acquires the global runtime gate.
///
/// # Panics
///
/// Panics if the calling thread already holds the gate. Public
/// operations must not be nested; internal code paths below a public
/// entry point use the non-gated `do_*` variants instead.
pub(crate) fn enter() -> GateGuard {
    ENTERED.with(|flag| {
        assert!(
            !flag.get(),
            "runtime gate entered twice by the same thread; \
             enter/leave pairing is broken"
        );
        flag.set(true);
    });

    let inner = GATE.lock().unwrap_or_else(|e| e.into_inner());
    debug_assert!(!HELD.swap(true, Ordering::Acquire), "gate held twice");

    GateGuard { inner: Some(inner) }
}

impl GateGuard {
    /// Runs `f` with the gate released and re-acquires it afterwards.
    ///
    /// This is the only place the emulation layer blocks on a native
    /// primitive; everything else happens under the gate.
    pub(crate) fn suspend<R>(&mut self, f: impl FnOnce() -> R) -> R {
        debug_assert!(HELD.swap(false, Ordering::Release));
        ENTERED.with(|flag| flag.set(false));
        self.inner = None;

        let result = f();

        ENTERED.with(|flag| flag.set(true));
        let inner = GATE.lock().unwrap_or_else(|e| e.into_inner());
        debug_assert!(!HELD.swap(true, Ordering::Acquire), "gate held twice");
        self.inner = Some(inner);

        result
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if self.inner.is_some() {
            debug_assert!(HELD.swap(false, Ordering::Release));
            ENTERED.with(|flag| flag.set(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_on_drop() {
        {
            let _gate = enter();
        }
        // A second acquisition on the same thread must succeed once the
        // first guard is gone.
        let _gate = enter();
    }

    #[test]
    fn suspend_reopens_the_gate() {
        let mut gate = enter();
        gate.suspend(|| {
            // While suspended, another thread can take the gate.
            let handle = std::thread::spawn(|| {
                let _gate = enter();
            });
            handle.join().unwrap();
        });
    }

    #[test]
    #[should_panic(expected = "entered twice")]
    fn reentry_is_fatal() {
        let _outer = enter();
        let _inner = enter();
    }
}
