//! Process-wide runtime state.
//!
//! One instance of this state exists per process: the shared signal
//! notification handle (used by every Signal-kind event), the number
//! of the most recently delivered signal, and the live-thread counter
//! backing introspection queries.
//!
//! The state is initialized implicitly on first use and torn down by
//! an explicit [`shutdown`].

use crate::native::{Handle, sys};

use log::debug;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

struct Shared {
    /// Process-wide manual-reset object set whenever a signal is
    /// delivered. Shared by every Signal-kind event in the process.
    signal_event: Handle,
}

// Safety: the handle is only ever used through the native layer, which
// is safe to call from any thread.
unsafe impl Send for Shared {}

static SHARED: Mutex<Option<Shared>> = Mutex::new(None);

/// Number of the most recently delivered signal, 0 when none.
static SIGNO: AtomicI32 = AtomicI32::new(0);

/// Threads spawned through this crate that have not yet finished.
static LIVE_THREADS: AtomicUsize = AtomicUsize::new(0);

/// Initializes the process-wide runtime state.
///
/// Called implicitly by every operation that needs the shared state;
/// calling it again after a successful initialization is a no-op.
pub fn init() -> io::Result<()> {
    let mut shared = SHARED.lock().unwrap();
    if shared.is_some() {
        return Ok(());
    }

    #[cfg(windows)]
    sys::ensure_winsock();

    SIGNO.store(0, Ordering::Release);
    let signal_event = sys::sys_event_create()?;
    debug!("runtime initialized, signal event {:?}", signal_event);

    *shared = Some(Shared { signal_event });
    Ok(())
}

/// Tears down the process-wide runtime state, closing the shared
/// signal notification handle.
///
/// A later operation reinitializes the state from scratch.
pub fn shutdown() {
    let mut shared = SHARED.lock().unwrap();
    if let Some(state) = shared.take() {
        sys::sys_close(state.signal_event);
        SIGNO.store(0, Ordering::Release);
        debug!("runtime shut down");
    }
}

/// Returns the shared signal notification handle, initializing the
/// runtime if needed.
pub(crate) fn signal_event() -> io::Result<Handle> {
    init()?;
    let shared = SHARED.lock().unwrap();
    // Just initialized above; shutdown cannot run while we hold the lock.
    Ok(shared.as_ref().map(|s| s.signal_event).unwrap())
}

/// Records the delivery of `signo` and fires every Signal-kind event
/// currently waiting on the shared notification handle.
///
/// Intended to be called from the application's signal handler (or a
/// test). Only one pending signal is tracked at a time; a second
/// delivery before the first is consumed overwrites the number.
pub fn deliver_signal(signo: i32) {
    SIGNO.store(signo, Ordering::Release);
    if let Ok(h) = signal_event() {
        sys::sys_event_set(h);
    }
}

/// Number of the most recently delivered signal.
pub(crate) fn pending_signal() -> i32 {
    SIGNO.load(Ordering::Acquire)
}

pub(crate) fn thread_started() {
    LIVE_THREADS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn thread_finished() {
    LIVE_THREADS.fetch_sub(1, Ordering::Relaxed);
}

pub(crate) fn live_threads() -> usize {
    LIVE_THREADS.load(Ordering::Relaxed)
}
