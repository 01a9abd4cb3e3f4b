//! Linux backend for the native wait primitives.
//!
//! Every waitable object is a file descriptor here, which keeps the
//! multiplexer uniform:
//! - manual-reset signal object → `eventfd` (write to set, drain to reset,
//!   readable for as long as it is set),
//! - timer object → `timerfd` (one-shot; re-arming clears a pending
//!   expiration, matching the self-clearing-on-arm contract),
//! - aggregate readiness selector → a per-call `epoll` instance, itself
//!   pollable and readable whenever any registered descriptor is ready,
//! - the blocking multi-handle wait → `poll(2)` over the staged handles.

use crate::fdset::FdInterest;
use crate::native::{Fd, Handle, handle_closed, handle_opened};

use libc::{
    CLOCK_MONOTONIC, EFD_CLOEXEC, EFD_NONBLOCK, EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL,
    EPOLLIN, EPOLLOUT, EPOLLPRI, F_GETFL, F_SETFL, O_NONBLOCK, POLLERR,
    POLLHUP, POLLIN, POLLOUT, POLLPRI, SO_TYPE, SOL_SOCKET, TFD_CLOEXEC, TFD_NONBLOCK, accept,
    c_int, close, epoll_create1, epoll_ctl, epoll_event, eventfd, fcntl, getsockopt, itimerspec,
    nfds_t, poll, pollfd, read, sockaddr, sockaddr_in, sockaddr_in6, sockaddr_storage, socklen_t,
    timerfd_create, timerfd_settime, timespec, write,
};
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

/// Creates a manual-reset signal object.
///
/// The handle stays readable from the moment it is set until it is
/// explicitly reset, mirroring a Win32 manual-reset event.
pub(crate) fn sys_event_create() -> io::Result<Handle> {
    let fd = unsafe { eventfd(0, EFD_CLOEXEC | EFD_NONBLOCK) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    handle_opened();
    Ok(fd)
}

/// Sets a signal object. Setting an already-set object is a no-op.
pub(crate) fn sys_event_set(h: Handle) {
    let buf: u64 = 1;
    unsafe {
        write(h, &buf as *const _ as *const _, 8);
    }
}

/// Resets a signal object back to the unsignaled state.
///
/// Best-effort: resetting an object that is not set is a no-op.
pub(crate) fn sys_event_reset(h: Handle) {
    let mut buf = 0u64;
    unsafe {
        read(h, &mut buf as *mut _ as *mut _, 8);
    }
}

/// Creates a one-shot timer object. The timer is created disarmed.
pub(crate) fn sys_timer_create() -> io::Result<Handle> {
    let fd = unsafe { timerfd_create(CLOCK_MONOTONIC, TFD_CLOEXEC | TFD_NONBLOCK) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    handle_opened();
    Ok(fd)
}

/// Arms a timer for the given relative duration.
///
/// Arming clears any pending expiration. The microsecond part may
/// exceed one second and is normalized before arming, since
/// `timerfd_settime` rejects a nanosecond field of a second or more.
/// A zero duration is rounded up to one nanosecond so the timer still
/// fires immediately (an all-zero expiration would disarm a timerfd
/// instead).
pub(crate) fn sys_timer_arm(h: Handle, secs: u64, usecs: u64) -> io::Result<()> {
    let mut value = timespec {
        tv_sec: (secs + usecs / 1_000_000) as libc::time_t,
        tv_nsec: ((usecs % 1_000_000) * 1_000) as libc::c_long,
    };

    if value.tv_sec == 0 && value.tv_nsec == 0 {
        value.tv_nsec = 1;
    }

    let spec = itimerspec {
        it_interval: timespec {
            tv_sec: 0,
            tv_nsec: 0,
        },
        it_value: value,
    };

    let rc = unsafe { timerfd_settime(h, 0, &spec, std::ptr::null_mut()) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Disarms a timer, discarding any pending expiration.
pub(crate) fn sys_timer_disarm(h: Handle) {
    let spec: itimerspec = unsafe { mem::zeroed() };
    unsafe {
        timerfd_settime(h, 0, &spec, std::ptr::null_mut());
    }
}

/// Closes an owned native handle.
pub(crate) fn sys_close(h: Handle) {
    unsafe { close(h) };
    handle_closed();
}

/// Returns `true` if the given descriptor refers to a socket.
pub(crate) fn sys_is_socket(fd: Fd) -> bool {
    let mut ty: c_int = 0;
    let mut len = mem::size_of::<c_int>() as socklen_t;

    unsafe { getsockopt(fd, SOL_SOCKET, SO_TYPE, &mut ty as *mut _ as *mut _, &mut len) == 0 }
}

/// Creates a per-call readiness selector.
///
/// The returned handle becomes readable whenever any descriptor
/// registered on it has matching activity.
pub(crate) fn sys_selector_create() -> io::Result<Handle> {
    let ep = unsafe { epoll_create1(EPOLL_CLOEXEC) };
    if ep < 0 {
        return Err(io::Error::last_os_error());
    }

    handle_opened();
    Ok(ep)
}

/// Registers a descriptor on a selector with the given interest mask.
pub(crate) fn sys_selector_add(sel: Handle, fd: Fd, mask: FdInterest) -> io::Result<()> {
    let mut flags = 0u32;
    if mask.contains(FdInterest::READ) {
        flags |= EPOLLIN as u32;
    }
    if mask.contains(FdInterest::WRITE) {
        flags |= EPOLLOUT as u32;
    }
    if mask.contains(FdInterest::EXCEPT) {
        flags |= EPOLLPRI as u32;
    }

    let mut event = epoll_event {
        events: flags,
        u64: fd as u64,
    };

    let rc = unsafe { epoll_ctl(sel, EPOLL_CTL_ADD, fd, &mut event) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Removes a descriptor from a selector.
pub(crate) fn sys_selector_del(sel: Handle, fd: Fd) {
    unsafe {
        epoll_ctl(sel, EPOLL_CTL_DEL, fd, std::ptr::null_mut());
    }
}

/// Releases a selector created by [`sys_selector_create`].
pub(crate) fn sys_selector_close(sel: Handle) {
    sys_close(sel);
}

/// Blocks until at least one of `handles` is signaled.
///
/// Returns `Ok(true)` when something is signaled and `Ok(false)` on a
/// native timeout with nothing signaled. Interrupted waits are retried.
pub(crate) fn sys_multi_wait(handles: &[Handle]) -> io::Result<bool> {
    let mut pfds: Vec<pollfd> = handles
        .iter()
        .map(|&fd| pollfd {
            fd,
            events: POLLIN,
            revents: 0,
        })
        .collect();

    loop {
        let n = unsafe { poll(pfds.as_mut_ptr(), pfds.len() as nfds_t, -1) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        return Ok(n > 0);
    }
}

/// Non-blocking probe: is this handle individually signaled right now?
pub(crate) fn sys_handle_signaled(h: Handle) -> bool {
    let mut pfd = pollfd {
        fd: h,
        events: POLLIN,
        revents: 0,
    };

    let n = unsafe { poll(&mut pfd, 1, 0) };
    n == 1 && pfd.revents & (POLLIN | POLLERR | POLLHUP) != 0
}

/// Non-blocking probe of one descriptor's current activity, restricted
/// to the requested interest mask.
pub(crate) fn sys_fd_activity(fd: Fd, mask: FdInterest) -> FdInterest {
    let mut events: libc::c_short = 0;
    if mask.contains(FdInterest::READ) {
        events |= POLLIN;
    }
    if mask.contains(FdInterest::WRITE) {
        events |= POLLOUT;
    }
    if mask.contains(FdInterest::EXCEPT) {
        events |= POLLPRI;
    }

    let mut pfd = pollfd {
        fd,
        events,
        revents: 0,
    };

    let n = unsafe { poll(&mut pfd, 1, 0) };
    if n != 1 {
        return FdInterest::empty();
    }

    let mut activity = FdInterest::empty();
    if pfd.revents & (POLLIN | POLLHUP | POLLERR) != 0 {
        activity |= FdInterest::READ;
    }
    if pfd.revents & POLLOUT != 0 {
        activity |= FdInterest::WRITE;
    }
    if pfd.revents & POLLPRI != 0 {
        activity |= FdInterest::EXCEPT;
    }

    activity & mask
}

/// Switches a descriptor between blocking and non-blocking mode.
///
/// Returns the previous non-blocking state so callers can restore it.
pub(crate) fn sys_fd_nonblocking(fd: Fd, nonblocking: bool) -> io::Result<bool> {
    let flags = unsafe { fcntl(fd, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let was = flags & O_NONBLOCK != 0;
    let next = if nonblocking {
        flags | O_NONBLOCK
    } else {
        flags & !O_NONBLOCK
    };

    if next != flags {
        let rc = unsafe { fcntl(fd, F_SETFL, next) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(was)
}

/// Reads from a descriptor into the given buffer.
pub(crate) fn sys_read(fd: Fd, buffer: &mut [u8]) -> io::Result<usize> {
    let n = unsafe { read(fd, buffer.as_mut_ptr() as *mut _, buffer.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Writes the buffer to a descriptor.
pub(crate) fn sys_write(fd: Fd, buffer: &[u8]) -> io::Result<usize> {
    let n = unsafe { write(fd, buffer.as_ptr() as *const _, buffer.len()) };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

/// Accepts a new incoming connection on a listening socket.
pub(crate) fn sys_accept(fd: Fd) -> io::Result<(Fd, SocketAddr)> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    let client = unsafe { accept(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) };
    if client < 0 {
        return Err(io::Error::last_os_error());
    }

    let addr = sockaddr_storage_to_socketaddr(&storage)?;
    Ok((client, addr))
}

/// Converts a `sockaddr_storage` to a Rust `SocketAddr`.
fn sockaddr_storage_to_socketaddr(storage: &sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as c_int {
        libc::AF_INET => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            let port = u16::from_be(addr.sin_port);

            Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }

        libc::AF_INET6 => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(addr.sin6_addr.s6_addr);
            let port = u16::from_be(addr.sin6_port);

            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                addr.sin6_flowinfo,
                addr.sin6_scope_id,
            )))
        }

        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported address family",
        )),
    }
}
