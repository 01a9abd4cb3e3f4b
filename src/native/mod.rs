//! Platform-specific native wait primitives.
//!
//! This module provides a unified interface over the per-OS wait
//! machinery the emulation layer is built on:
//! - manual-reset signal objects (set / reset / probe),
//! - one-shot timer objects,
//! - per-call readiness selectors aggregating several descriptors,
//! - the blocking multi-handle wait itself.
//!
//! The concrete implementation is selected at compile time depending
//! on the target operating system. Every create/close path also feeds
//! a live-handle counter used by the resource-release tests.

use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(target_os = "linux")]
pub(crate) mod linux;

#[cfg(windows)]
pub(crate) mod windows;

#[cfg(target_os = "linux")]
pub(crate) use linux as sys;

#[cfg(windows)]
pub(crate) use windows as sys;

/// Raw descriptor type as used by callers of the emulation layer.
#[cfg(unix)]
pub type Fd = std::os::fd::RawFd;

/// Raw descriptor type as used by callers of the emulation layer.
///
/// On Windows this is a WinSock `SOCKET` value.
#[cfg(windows)]
pub type Fd = std::os::windows::io::RawSocket;

/// Native wait handle type.
///
/// On Linux every waitable object is a file descriptor (eventfd,
/// timerfd, epoll instance), so `Handle` and [`Fd`] coincide.
#[cfg(unix)]
pub type Handle = std::os::fd::RawFd;

/// Native wait handle type.
#[cfg(windows)]
pub type Handle = windows_sys::Win32::Foundation::HANDLE;

/// Number of native handles currently owned by this crate.
///
/// Incremented by every successful handle creation and decremented by
/// every close. Test suites use the delta to verify that freeing a
/// ring releases exactly one resource per member.
static LIVE_HANDLES: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn handle_opened() {
    LIVE_HANDLES.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn handle_closed() {
    LIVE_HANDLES.fetch_sub(1, Ordering::Relaxed);
}

/// Returns the number of native handles currently owned by the crate.
pub fn live_handles() -> usize {
    LIVE_HANDLES.load(Ordering::Relaxed)
}
