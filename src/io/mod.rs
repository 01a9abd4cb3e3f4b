//! Cooperative I/O wrappers.
//!
//! Two families: the plain wrappers (`read`, `write`) hold the runtime
//! gate as ordered bookkeeping and release it around the blocking
//! syscall, and the event-aware variants (`read_ev`, `write_ev`,
//! `accept_ev`, `select_ev`) retry a non-blocking syscall against a
//! readiness event, with an optional caller event merged in. When only
//! the caller's event fires, the operation gives up with
//! [`ErrorKind::Interrupted`](std::io::ErrorKind::Interrupted), the
//! way a signal interrupts a syscall.

pub mod pipes;

use crate::error::Error;
use crate::event::{EventFlags, EventId, EventKind, EventSpec, EventStatus, Events, Ring};
use crate::fdset::FdSet;
use crate::gate::{self, GateGuard};
use crate::mux;
use crate::native::sys;
use crate::native::Fd;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

/// Reads from a descriptor, releasing the runtime gate while the
/// syscall blocks.
pub fn read(fd: Fd, buffer: &mut [u8]) -> io::Result<usize> {
    let mut gate = gate::enter();
    gate.suspend(|| sys::sys_read(fd, buffer))
}

/// Writes to a descriptor, releasing the runtime gate while the
/// syscall blocks.
pub fn write(fd: Fd, buffer: &[u8]) -> io::Result<usize> {
    let mut gate = gate::enter();
    gate.suspend(|| sys::sys_write(fd, buffer))
}

/// Reads from a descriptor, waiting cooperatively for readability.
///
/// If `extra` fires before the descriptor turns readable, the read is
/// abandoned with `ErrorKind::Interrupted` and the caller inspects its
/// own event. The descriptor's blocking mode is restored on every
/// path.
pub fn read_ev(
    events: &mut Events,
    fd: Fd,
    buffer: &mut [u8],
    extra: Option<EventId>,
) -> io::Result<usize> {
    let mut gate = gate::enter();
    let was_nonblocking = sys::sys_fd_nonblocking(fd, true)?;
    let result = read_loop(events, fd, buffer, extra, &mut gate);
    if !was_nonblocking {
        let _ = sys::sys_fd_nonblocking(fd, false);
    }
    result
}

fn read_loop(
    events: &mut Events,
    fd: Fd,
    buffer: &mut [u8],
    extra: Option<EventId>,
    gate: &mut GateGuard,
) -> io::Result<usize> {
    let mut internal = None;
    let outcome = loop {
        match sys::sys_read(fd, buffer) {
            Ok(n) => break Ok(n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if let Err(err) =
                    wait_for(events, &mut internal, EventSpec::FdReadable(fd), extra, gate)
                {
                    break Err(err);
                }
            }
            Err(err) => break Err(err),
        }
    };
    if let Some(id) = internal {
        events.do_free(id);
    }
    outcome
}

/// Writes to a descriptor, waiting cooperatively for writability.
///
/// Same contract as [`read_ev`].
pub fn write_ev(
    events: &mut Events,
    fd: Fd,
    buffer: &[u8],
    extra: Option<EventId>,
) -> io::Result<usize> {
    let mut gate = gate::enter();
    let was_nonblocking = sys::sys_fd_nonblocking(fd, true)?;
    let result = write_loop(events, fd, buffer, extra, &mut gate);
    if !was_nonblocking {
        let _ = sys::sys_fd_nonblocking(fd, false);
    }
    result
}

fn write_loop(
    events: &mut Events,
    fd: Fd,
    buffer: &[u8],
    extra: Option<EventId>,
    gate: &mut GateGuard,
) -> io::Result<usize> {
    let mut internal = None;
    let outcome = loop {
        match sys::sys_write(fd, buffer) {
            Ok(n) => break Ok(n),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if let Err(err) =
                    wait_for(events, &mut internal, EventSpec::FdWritable(fd), extra, gate)
                {
                    break Err(err);
                }
            }
            Err(err) => break Err(err),
        }
    };
    if let Some(id) = internal {
        events.do_free(id);
    }
    outcome
}

/// Accepts a connection, waiting cooperatively for the listener to
/// turn readable.
///
/// Same contract as [`read_ev`].
pub fn accept_ev(
    events: &mut Events,
    fd: Fd,
    extra: Option<EventId>,
) -> io::Result<(Fd, SocketAddr)> {
    let mut gate = gate::enter();
    let was_nonblocking = sys::sys_fd_nonblocking(fd, true)?;
    let result = accept_loop(events, fd, extra, &mut gate);
    if !was_nonblocking {
        let _ = sys::sys_fd_nonblocking(fd, false);
    }
    result
}

fn accept_loop(
    events: &mut Events,
    fd: Fd,
    extra: Option<EventId>,
    gate: &mut GateGuard,
) -> io::Result<(Fd, SocketAddr)> {
    let mut internal = None;
    let outcome = loop {
        match sys::sys_accept(fd) {
            Ok(accepted) => break Ok(accepted),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                if let Err(err) =
                    wait_for(events, &mut internal, EventSpec::FdReadable(fd), extra, gate)
                {
                    break Err(err);
                }
            }
            Err(err) => break Err(err),
        }
    };
    if let Some(id) = internal {
        events.do_free(id);
    }
    outcome
}

/// One blocking round of the `*_ev` retry loop.
///
/// Lazily creates the internal readiness event, merges the caller's
/// event in and waits. Fails with `Interrupted` when only the caller's
/// event fired.
fn wait_for(
    events: &mut Events,
    internal: &mut Option<EventId>,
    spec: EventSpec,
    extra: Option<EventId>,
    gate: &mut GateGuard,
) -> io::Result<()> {
    let id = match *internal {
        Some(id) => id,
        None => {
            let id = events.do_create(spec, EventFlags::empty())?;
            *internal = Some(id);
            id
        }
    };

    let mut ring = Ring::from(id);
    if let Some(extra) = extra {
        ring.merge(Ring::from(extra));
    }
    mux::do_wait(events, &ring, gate)?;

    if extra.is_some() && events.record(id).status != EventStatus::Occurred {
        return Err(Error::Interrupted.into());
    }
    Ok(())
}

/// Select-style readiness over up to three descriptor sets.
///
/// On return the sets are narrowed to the active descriptors and the
/// count of those descriptors is returned. A timeout clears the sets
/// and returns zero. If only `extra` fired, the call fails with
/// `ErrorKind::Interrupted` and the sets are left untouched.
pub fn select_ev(
    events: &mut Events,
    rfds: Option<&mut FdSet>,
    wfds: Option<&mut FdSet>,
    efds: Option<&mut FdSet>,
    timeout: Option<Duration>,
    extra: Option<EventId>,
) -> io::Result<usize> {
    let mut gate = gate::enter();

    let spec = EventSpec::Select {
        rfds: rfds.as_deref().cloned(),
        wfds: wfds.as_deref().cloned(),
        efds: efds.as_deref().cloned(),
    };
    let select = events.do_create(spec, EventFlags::empty())?;
    let timer = match timeout {
        Some(duration) => match events.do_create(EventSpec::timer(duration), EventFlags::empty()) {
            Ok(id) => Some(id),
            Err(err) => {
                events.do_free(select);
                return Err(err.into());
            }
        },
        None => None,
    };

    let mut ring = Ring::from(select);
    if let Some(timer) = timer {
        ring.merge(Ring::from(timer));
    }
    if let Some(extra) = extra {
        ring.merge(Ring::from(extra));
    }

    let result = match mux::do_wait(events, &ring, &mut gate) {
        Err(err) => Err(io::Error::from(err)),
        Ok(_) if events.record(select).status == EventStatus::Occurred => {
            let (ready, out_r, out_w, out_e) = match &events.record(select).kind {
                EventKind::Select { rfds, wfds, efds, ready } => (
                    ready.unwrap_or(0),
                    rfds.clone(),
                    wfds.clone(),
                    efds.clone(),
                ),
                _ => unreachable!("select event changed kind"),
            };
            if let Some(out) = rfds {
                *out = out_r.unwrap_or_default();
            }
            if let Some(out) = wfds {
                *out = out_w.unwrap_or_default();
            }
            if let Some(out) = efds {
                *out = out_e.unwrap_or_default();
            }
            Ok(ready)
        }
        Ok(_) if timer.is_some_and(|id| events.record(id).status == EventStatus::Occurred) => {
            if let Some(out) = rfds {
                out.clear();
            }
            if let Some(out) = wfds {
                out.clear();
            }
            if let Some(out) = efds {
                out.clear();
            }
            Ok(0)
        }
        Ok(_) => Err(Error::Interrupted.into()),
    };

    events.do_free(select);
    if let Some(timer) = timer {
        events.do_free(timer);
    }
    result
}
