//! The wait multiplexer.
//!
//! One pass maps every ring member to a native wait handle, blocks on
//! all of them at once with the runtime gate released, then probes
//! each handle individually. The native multi-wait only names one
//! winner even when several conditions hold, so the probe pass is what
//! decides which events actually fired.

mod stage;

use stage::{Cleanup, Staging};

use crate::error::{Error, Result};
use crate::event::{EventKind, EventStatus, Events, Ring};
use crate::fdset::{FdInterest, FdSet};
use crate::gate::GateGuard;
use crate::native::sys;
use crate::runtime;

use log::{debug, trace};
use std::io;

/// Upper bound on the number of staged wait handles per pass.
pub(crate) const WAIT_CEILING: usize = 32;

/// Runs one wait pass over `ring`. Returns the count of events that
/// fired, `Ok(0)` for a native timeout with nothing signaled.
pub(crate) fn do_wait(events: &mut Events, ring: &Ring, gate: &mut GateGuard) -> Result<usize> {
    if ring.len() > WAIT_CEILING {
        return Err(Error::CapacityExceeded {
            staged: ring.len(),
            ceiling: WAIT_CEILING,
        });
    }

    // Start every member from a clean slate; stale output slots from a
    // previous pass must not leak into this one.
    for &id in ring.members() {
        let record = events.record_mut(id);
        record.status = EventStatus::Pending;
        match &mut record.kind {
            EventKind::Signal { signo, .. } => *signo = None,
            EventKind::Select { ready, .. } => *ready = None,
            _ => {}
        }
    }

    let staging = Staging::build(events, ring.members())?;
    if staging.slots.is_empty() {
        return Err(Error::NativeWait(io::Error::new(
            io::ErrorKind::InvalidInput,
            "no waitable conditions staged",
        )));
    }

    let handles: Vec<_> = staging.slots.iter().map(|slot| slot.handle).collect();
    trace!("blocking on {} staged handle(s)", handles.len());

    let woke = gate
        .suspend(|| sys::sys_multi_wait(&handles))
        .map_err(Error::NativeWait)?;
    if !woke {
        debug!("multi-wait returned with nothing signaled");
        return Ok(0);
    }

    // The wakeup names at most one handle; probe them all, since any
    // number of conditions may hold by now.
    let mut fired = 0;
    for slot in &staging.slots {
        if !sys::sys_handle_signaled(slot.handle) {
            continue;
        }

        let record = events.record_mut(slot.event);

        // The shared signal handle wakes every Signal-kind member;
        // only those whose set covers the delivered number fire.
        if let EventKind::Signal { set, .. } = &record.kind {
            let pending = runtime::pending_signal();
            if !set.is_empty() && !set.contains(pending) {
                debug!(
                    "signal {} outside the set of event {:?}, not firing",
                    pending, slot.event
                );
                continue;
            }
        }

        record.status = EventStatus::Occurred;
        fired += 1;
        trace!("{} event {:?} fired", record.kind.name(), slot.event);

        match &mut record.kind {
            EventKind::Signal { signo, .. } => {
                *signo = Some(runtime::pending_signal());
                sys::sys_event_reset(slot.handle);
            }
            EventKind::Generic(_) => {
                sys::sys_event_reset(slot.handle);
            }
            EventKind::Select { rfds, wfds, efds, ready } => {
                let Cleanup::Selector { fds, .. } = &slot.cleanup else {
                    continue;
                };
                *ready = Some(reenumerate(fds, rfds, wfds, efds));
            }
            // Timers self-clear on the next arm; descriptor events
            // stay level-triggered on purpose.
            _ => {}
        }
    }

    Ok(fired)
}

/// Re-checks every registered descriptor of a fired select event and
/// narrows the caller's sets down to the active ones. Returns the
/// total count of active descriptors across the three sets.
fn reenumerate(
    fds: &[stage::RestoreFd],
    rfds: &mut Option<FdSet>,
    wfds: &mut Option<FdSet>,
    efds: &mut Option<FdSet>,
) -> usize {
    let mut active_r = FdSet::new();
    let mut active_w = FdSet::new();
    let mut active_e = FdSet::new();

    for entry in fds {
        let activity = sys::sys_fd_activity(entry.fd, entry.mask);
        if activity.contains(FdInterest::READ)
            && rfds.as_ref().is_some_and(|set| set.contains(entry.fd))
        {
            active_r.insert(entry.fd);
        }
        if activity.contains(FdInterest::WRITE)
            && wfds.as_ref().is_some_and(|set| set.contains(entry.fd))
        {
            active_w.insert(entry.fd);
        }
        if activity.contains(FdInterest::EXCEPT)
            && efds.as_ref().is_some_and(|set| set.contains(entry.fd))
        {
            active_e.insert(entry.fd);
        }
    }

    let total = active_r.len() + active_w.len() + active_e.len();
    if rfds.is_some() {
        *rfds = Some(active_r);
    }
    if wfds.is_some() {
        *wfds = Some(active_w);
    }
    if efds.is_some() {
        *efds = Some(active_e);
    }
    total
}
