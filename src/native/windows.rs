//! Windows backend for the native wait primitives.
//!
//! This is the platform the emulation layer was originally shaped by:
//! - manual-reset signal object → a manual-reset Win32 event,
//! - timer object → a waitable timer (relative due times in 100 ns units),
//! - aggregate readiness selector → a per-call event associated with
//!   sockets through `WSAEventSelect`,
//! - the blocking multi-handle wait → `WaitForMultipleObjects`.
//!
//! Both SOCKETs and file HANDLEs are accepted as descriptors; the
//! implementation dynamically distinguishes between them for I/O.

use crate::fdset::FdInterest;
use crate::native::{Fd, Handle, handle_closed, handle_opened};

use std::io;
use std::mem;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::ptr;
use std::sync::Once;

use windows_sys::Win32::Foundation::{
    CloseHandle, HANDLE, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::Networking::WinSock::{
    AF_INET, AF_INET6, FD_ACCEPT, FD_CLOSE, FD_OOB, FD_READ, FD_WRITE, FIONBIO, INVALID_SOCKET,
    SO_TYPE, SOCKADDR, SOCKADDR_IN, SOCKADDR_IN6, SOCKADDR_STORAGE, SOCKET, SOCKET_ERROR,
    SOL_SOCKET, WSADATA, WSAENOTSOCK, WSAEnumNetworkEvents, WSAEventSelect, WSAGetLastError,
    WSANETWORKEVENTS, WSAStartup, accept, getsockopt, ioctlsocket, recv, send,
};
use windows_sys::Win32::Security::SECURITY_ATTRIBUTES;
use windows_sys::Win32::Storage::FileSystem::{ReadFile, WriteFile};
use windows_sys::Win32::System::Threading::{
    CreateEventW, CreateWaitableTimerW, INFINITE, ResetEvent, SetWaitableTimer,
    WaitForMultipleObjects, WaitForSingleObject,
};

/// Winsock initialization guard.
static WINSOCK_INIT: Once = Once::new();

/// Initializes Winsock if not already initialized.
pub(crate) fn ensure_winsock() {
    WINSOCK_INIT.call_once(|| unsafe {
        let mut data: WSADATA = mem::zeroed();
        let rc = WSAStartup(0x202, &mut data);
        assert_eq!(rc, 0, "WSAStartup failed: {}", rc);
    });
}

/// Inheritable security attributes, as used for every object we create.
fn inheritable_attrs() -> SECURITY_ATTRIBUTES {
    SECURITY_ATTRIBUTES {
        nLength: mem::size_of::<SECURITY_ATTRIBUTES>() as u32,
        lpSecurityDescriptor: ptr::null_mut(),
        bInheritHandle: 1,
    }
}

/// Creates a manual-reset signal object.
pub(crate) fn sys_event_create() -> io::Result<Handle> {
    let attrs = inheritable_attrs();
    let h = unsafe { CreateEventW(&attrs, 1, 0, ptr::null()) };
    if h.is_null() {
        return Err(io::Error::last_os_error());
    }

    handle_opened();
    Ok(h)
}

/// Sets a signal object.
pub(crate) fn sys_event_set(h: Handle) {
    unsafe {
        windows_sys::Win32::System::Threading::SetEvent(h);
    }
}

/// Resets a signal object back to the unsignaled state.
pub(crate) fn sys_event_reset(h: Handle) {
    unsafe {
        ResetEvent(h);
    }
}

/// Creates a one-shot waitable timer. The timer is created disarmed.
pub(crate) fn sys_timer_create() -> io::Result<Handle> {
    let attrs = inheritable_attrs();
    let h = unsafe { CreateWaitableTimerW(&attrs, 1, ptr::null()) };
    if h.is_null() {
        return Err(io::Error::last_os_error());
    }

    handle_opened();
    Ok(h)
}

/// Arms a timer for the given relative duration.
///
/// `SetWaitableTimer` takes relative due times as negative 100 ns
/// units and clears any pending expiration when re-armed.
pub(crate) fn sys_timer_arm(h: Handle, secs: u64, usecs: u64) -> io::Result<()> {
    let due: i64 = -((secs as i64) * 10_000_000 + (usecs as i64) * 10);

    let rc = unsafe { SetWaitableTimer(h, &due, 0, None, ptr::null(), 0) };
    if rc == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Disarms a timer, discarding any pending expiration.
pub(crate) fn sys_timer_disarm(h: Handle) {
    unsafe {
        windows_sys::Win32::System::Threading::CancelWaitableTimer(h);
    }
}

/// Closes an owned native handle.
pub(crate) fn sys_close(h: Handle) {
    unsafe {
        CloseHandle(h);
    }
    handle_closed();
}

/// Returns `true` if the given descriptor refers to a socket.
pub(crate) fn sys_is_socket(fd: Fd) -> bool {
    let mut ty: i32 = 0;
    let mut len = mem::size_of::<i32>() as i32;

    unsafe {
        getsockopt(
            fd as SOCKET,
            SOL_SOCKET,
            SO_TYPE,
            &mut ty as *mut _ as *mut u8,
            &mut len,
        ) == 0
    }
}

/// Maps a portable interest mask to WinSock network-event bits.
fn netevents(mask: FdInterest) -> i32 {
    let mut bits = 0;
    if mask.contains(FdInterest::READ) {
        bits |= FD_READ | FD_ACCEPT;
    }
    if mask.contains(FdInterest::WRITE) {
        bits |= FD_WRITE;
    }
    if mask.contains(FdInterest::EXCEPT) {
        bits |= FD_OOB | FD_CLOSE;
    }
    bits as i32
}

/// Creates a per-call readiness selector.
///
/// On Windows the selector is itself a manual-reset event; sockets are
/// attached to it through `WSAEventSelect`.
pub(crate) fn sys_selector_create() -> io::Result<Handle> {
    ensure_winsock();
    sys_event_create()
}

/// Registers a descriptor on a selector with the given interest mask.
///
/// `WSAEventSelect` switches the socket to non-blocking mode as a side
/// effect; callers are expected to restore the original mode after the
/// registration is cleared.
pub(crate) fn sys_selector_add(sel: Handle, fd: Fd, mask: FdInterest) -> io::Result<()> {
    let rc = unsafe { WSAEventSelect(fd as SOCKET, sel, netevents(mask)) };
    if rc != 0 {
        Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() }))
    } else {
        Ok(())
    }
}

/// Clears a descriptor's association with a selector.
pub(crate) fn sys_selector_del(_sel: Handle, fd: Fd) {
    unsafe {
        WSAEventSelect(fd as SOCKET, ptr::null_mut(), 0);
    }
}

/// Releases a selector created by [`sys_selector_create`].
pub(crate) fn sys_selector_close(sel: Handle) {
    sys_close(sel);
}

/// Blocks until at least one of `handles` is signaled.
///
/// Returns `Ok(true)` when something is signaled and `Ok(false)` on a
/// native timeout with nothing signaled.
pub(crate) fn sys_multi_wait(handles: &[Handle]) -> io::Result<bool> {
    let n = unsafe { WaitForMultipleObjects(handles.len() as u32, handles.as_ptr(), 0, INFINITE) };

    if n == WAIT_FAILED {
        Err(io::Error::last_os_error())
    } else if n == WAIT_TIMEOUT {
        Ok(false)
    } else {
        Ok(true)
    }
}

/// Non-blocking probe: is this handle individually signaled right now?
pub(crate) fn sys_handle_signaled(h: Handle) -> bool {
    unsafe { WaitForSingleObject(h, 0) == WAIT_OBJECT_0 }
}

/// Non-blocking probe of one socket's current activity, restricted to
/// the requested interest mask.
pub(crate) fn sys_fd_activity(fd: Fd, mask: FdInterest) -> FdInterest {
    let mut ne: WSANETWORKEVENTS = unsafe { mem::zeroed() };

    let rc = unsafe { WSAEnumNetworkEvents(fd as SOCKET, ptr::null_mut(), &mut ne) };
    if rc != 0 {
        return FdInterest::empty();
    }

    let bits = ne.lNetworkEvents as u32;
    let mut activity = FdInterest::empty();
    if bits & (FD_READ | FD_ACCEPT) != 0 {
        activity |= FdInterest::READ;
    }
    if bits & FD_WRITE != 0 {
        activity |= FdInterest::WRITE;
    }
    if bits & (FD_OOB | FD_CLOSE) != 0 {
        activity |= FdInterest::EXCEPT;
    }

    activity & mask
}

/// Switches a socket between blocking and non-blocking mode.
///
/// WinSock offers no way to query the current mode, so the previous
/// state cannot be recovered; callers get `false` (blocking), which is
/// the overwhelmingly common default the emulation restores to.
pub(crate) fn sys_fd_nonblocking(fd: Fd, nonblocking: bool) -> io::Result<bool> {
    let mut val: u32 = if nonblocking { 1 } else { 0 };

    let rc = unsafe { ioctlsocket(fd as SOCKET, FIONBIO, &mut val) };
    if rc == SOCKET_ERROR {
        Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() }))
    } else {
        Ok(false)
    }
}

/// Reads from a descriptor into the given buffer.
///
/// Tries `recv` first and falls back to `ReadFile` when the descriptor
/// turns out to be a file handle rather than a socket.
pub(crate) fn sys_read(fd: Fd, buffer: &mut [u8]) -> io::Result<usize> {
    unsafe {
        let rc = recv(fd as SOCKET, buffer.as_mut_ptr(), buffer.len() as i32, 0);
        if rc != SOCKET_ERROR {
            return Ok(rc as usize);
        }

        if WSAGetLastError() != WSAENOTSOCK {
            return Err(io::Error::from_raw_os_error(WSAGetLastError()));
        }

        let mut nread = 0u32;
        let ok = ReadFile(
            fd as HANDLE,
            buffer.as_mut_ptr(),
            buffer.len() as u32,
            &mut nread,
            ptr::null_mut(),
        );
        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(nread as usize)
        }
    }
}

/// Writes the buffer to a descriptor, with the same socket-then-file
/// fallback as [`sys_read`].
pub(crate) fn sys_write(fd: Fd, buffer: &[u8]) -> io::Result<usize> {
    unsafe {
        let rc = send(fd as SOCKET, buffer.as_ptr(), buffer.len() as i32, 0);
        if rc != SOCKET_ERROR {
            return Ok(rc as usize);
        }

        if WSAGetLastError() != WSAENOTSOCK {
            return Err(io::Error::from_raw_os_error(WSAGetLastError()));
        }

        let mut nwritten = 0u32;
        let ok = WriteFile(
            fd as HANDLE,
            buffer.as_ptr(),
            buffer.len() as u32,
            &mut nwritten,
            ptr::null_mut(),
        );
        if ok == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(nwritten as usize)
        }
    }
}

/// Accepts a new incoming connection on a listening socket.
pub(crate) fn sys_accept(fd: Fd) -> io::Result<(Fd, SocketAddr)> {
    ensure_winsock();

    let mut storage: SOCKADDR_STORAGE = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_STORAGE>() as i32;

    let client = unsafe {
        accept(
            fd as SOCKET,
            &mut storage as *mut _ as *mut SOCKADDR,
            &mut len,
        )
    };
    if client == INVALID_SOCKET {
        return Err(io::Error::from_raw_os_error(unsafe { WSAGetLastError() }));
    }

    let addr = sockaddr_storage_to_socketaddr(&storage)?;
    Ok((client as Fd, addr))
}

/// Converts a `SOCKADDR_STORAGE` to a Rust `SocketAddr`.
fn sockaddr_storage_to_socketaddr(storage: &SOCKADDR_STORAGE) -> io::Result<SocketAddr> {
    unsafe {
        match storage.ss_family {
            AF_INET => {
                let sin = &*(storage as *const _ as *const SOCKADDR_IN);
                let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.S_un.S_addr));
                Ok(SocketAddr::V4(SocketAddrV4::new(
                    ip,
                    u16::from_be(sin.sin_port),
                )))
            }
            AF_INET6 => {
                let sin6 = &*(storage as *const _ as *const SOCKADDR_IN6);
                let ip = Ipv6Addr::from(sin6.sin6_addr.u.Byte);
                Ok(SocketAddr::V6(SocketAddrV6::new(
                    ip,
                    u16::from_be(sin6.sin6_port),
                    0,
                    0,
                )))
            }
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "unsupported address family",
            )),
        }
    }
}
