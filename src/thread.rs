//! Thread lifecycle on top of native preemptive threads.
//!
//! Threads here are ordinary OS threads; cooperation comes from the
//! runtime gate, not from a scheduler. The extra surface over
//! [`std::thread`] is the attribute object, the live-thread count and
//! the two forced-termination operations, both of which are unsafe by
//! nature.

use crate::runtime;

use log::warn;
use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::os::unix::thread::JoinHandleExt;
#[cfg(windows)]
use std::os::windows::io::AsRawHandle;

/// Spawn-time attributes, in the manner of a pthread attribute
/// object.
#[derive(Debug, Clone, Default)]
pub struct ThreadAttr {
    joinable: bool,
    stack_size: Option<usize>,
    name: Option<String>,
}

impl ThreadAttr {
    /// A joinable thread with default stack size and no name.
    pub fn new() -> Self {
        Self {
            joinable: true,
            stack_size: None,
            name: None,
        }
    }

    /// Whether the thread can be joined. A non-joinable thread runs
    /// detached; [`Thread::join`] refuses it.
    pub fn joinable(mut self, joinable: bool) -> Self {
        self.joinable = joinable;
        self
    }

    /// Stack size in bytes.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Thread name, visible in debuggers and panic messages.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A spawned thread.
pub struct Thread<T> {
    handle: Option<JoinHandle<T>>,
    /// Platform thread id, kept for forced termination.
    native: usize,
    joinable: bool,
}

struct CountGuard;

impl Drop for CountGuard {
    fn drop(&mut self) {
        runtime::thread_finished();
    }
}

/// Spawns a thread with the given attributes.
pub fn spawn<F, T>(attr: ThreadAttr, f: F) -> io::Result<Thread<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut builder = std::thread::Builder::new();
    if let Some(bytes) = attr.stack_size {
        builder = builder.stack_size(bytes);
    }
    if let Some(name) = attr.name {
        builder = builder.name(name);
    }

    runtime::thread_started();
    let handle = builder
        .spawn(move || {
            let _count = CountGuard;
            f()
        })
        .inspect_err(|_| runtime::thread_finished())?;

    #[cfg(unix)]
    let native = handle.as_pthread_t() as usize;
    #[cfg(windows)]
    let native = handle.as_raw_handle() as usize;

    Ok(Thread {
        handle: Some(handle),
        native,
        joinable: attr.joinable,
    })
}

impl<T> Thread<T> {
    /// Waits for the thread to finish and returns its result.
    ///
    /// Refuses a non-joinable thread; fails if the thread panicked or
    /// was already joined.
    pub fn join(mut self) -> io::Result<T> {
        if !self.joinable {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "thread was spawned non-joinable",
            ));
        }
        let handle = self.handle.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "thread already joined")
        })?;
        handle
            .join()
            .map_err(|_| io::Error::other("thread panicked"))
    }

    /// Returns `true` once the thread's closure has run to completion.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    /// Asks the thread to end, then kills it.
    ///
    /// Waits up to one second for the thread to finish on its own
    /// before falling back to [`abort`](Self::abort).
    ///
    /// # Safety
    ///
    /// Same contract as [`abort`](Self::abort) once the grace period
    /// expires.
    pub unsafe fn cancel(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if self.is_finished() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        warn!("thread did not finish within the grace period, killing it");
        unsafe { self.abort() };
    }

    /// Kills the thread immediately.
    ///
    /// # Safety
    ///
    /// The thread is stopped wherever it happens to be. Locks it holds
    /// stay locked, destructors do not run and any state it was
    /// mutating is left torn. Only acceptable for threads known to
    /// touch nothing shared.
    pub unsafe fn abort(&mut self) {
        if self.is_finished() {
            return;
        }
        #[cfg(unix)]
        unsafe {
            libc::pthread_cancel(self.native as libc::pthread_t);
        }
        #[cfg(windows)]
        unsafe {
            windows_sys::Win32::System::Threading::TerminateThread(
                self.native as windows_sys::Win32::Foundation::HANDLE,
                1,
            );
        }
    }
}

/// Number of threads spawned through [`spawn`] that have not finished
/// yet.
pub fn active_count() -> usize {
    runtime::live_threads()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn join_returns_the_closure_result() {
        let thread = spawn(ThreadAttr::new(), || 41 + 1).unwrap();
        assert_eq!(thread.join().unwrap(), 42);
    }

    #[test]
    fn non_joinable_threads_refuse_join() {
        let (tx, rx) = mpsc::channel();
        let thread = spawn(ThreadAttr::new().joinable(false), move || {
            rx.recv().ok();
        })
        .unwrap();

        let err = thread.join().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        tx.send(()).unwrap();
    }

    #[test]
    fn named_threads_spawn() {
        let thread = spawn(ThreadAttr::new().name("worker").stack_size(128 * 1024), || {
            std::thread::current().name().map(str::to_owned)
        })
        .unwrap();
        assert_eq!(thread.join().unwrap().as_deref(), Some("worker"));
    }
}
