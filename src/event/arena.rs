//! The event arena.
//!
//! Events are stored in a slab; callers hold [`EventId`] indices into
//! it. Creation allocates the native resource appropriate to the kind,
//! freeing releases it again, and the accessors read back the output
//! slots a wait pass filled in.
//!
//! Every public operation takes the global runtime gate for the
//! duration of its bookkeeping; the `do_*` variants are the non-gated
//! internals shared with the multiplexer and the I/O wrappers.

use super::record::{Event, EventFlags, EventKind, EventSpec, EventStatus};
use super::ring::Ring;
use crate::error::{Error, Result};
use crate::fdset::FdSet;
use crate::gate;
use crate::mux;
use crate::native::sys;
use crate::runtime;
use crate::utils::Slab;

use log::{debug, trace};

/// Stable index of an event inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub(crate) usize);

/// Outcome of a fired Select-kind event.
///
/// The three sets are the caller's original sets filtered down to the
/// descriptors that actually had matching activity.
#[derive(Debug)]
pub struct SelectOutcome<'a> {
    /// Total count of active descriptors across all three sets.
    pub ready: usize,
    pub rfds: Option<&'a FdSet>,
    pub wfds: Option<&'a FdSet>,
    pub efds: Option<&'a FdSet>,
}

/// An arena of events.
///
/// The arena owns the native resources of its events; dropping it
/// releases whatever was not freed explicitly.
pub struct Events {
    slab: Slab<Event>,
}

impl Default for Events {
    fn default() -> Self {
        Self::new()
    }
}

impl Events {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self { slab: Slab::new() }
    }

    /// Creates one event for the given condition.
    ///
    /// Equivalent to [`create_with_flags`](Self::create_with_flags)
    /// with an empty flag set.
    pub fn create(&mut self, spec: EventSpec) -> Result<EventId> {
        self.create_with_flags(spec, EventFlags::empty())
    }

    /// Creates one event for the given condition and mode flags.
    ///
    /// Allocates the native resource appropriate to the kind: a timer
    /// object for [`EventSpec::Timer`], a manual-reset signal object
    /// for most other kinds, and nothing for the borrowing kinds
    /// (Generic, Mutex). On handle-creation failure nothing is leaked.
    pub fn create_with_flags(&mut self, spec: EventSpec, flags: EventFlags) -> Result<EventId> {
        let _gate = gate::enter();
        self.do_create(spec, flags)
    }

    pub(crate) fn do_create(&mut self, spec: EventSpec, mut flags: EventFlags) -> Result<EventId> {
        if flags.intersects(EventFlags::UNSUPPORTED) {
            debug!("event creation rejected, flags {:?}", flags);
            return Err(Error::UnsupportedCombination(flags));
        }

        runtime::init().map_err(Error::HandleCreation)?;

        let kind = match spec {
            EventSpec::FdReadable(fd) => {
                flags |= EventFlags::UNTIL_READABLE;
                EventKind::FdReadable(fd)
            }
            EventSpec::FdWritable(fd) => {
                flags |= EventFlags::UNTIL_WRITABLE;
                EventKind::FdWritable(fd)
            }
            EventSpec::Timer { secs, usecs } => EventKind::Timer { secs, usecs },
            EventSpec::Signal(set) => EventKind::Signal { set, signo: None },
            EventSpec::Select { rfds, wfds, efds } => EventKind::Select {
                rfds,
                wfds,
                efds,
                ready: None,
            },
            EventSpec::Mutex(handle) => EventKind::Mutex(handle),
            EventSpec::Generic(handle) => EventKind::Generic(handle),
        };

        let handle = match kind {
            EventKind::Timer { .. } => Some(sys::sys_timer_create().map_err(Error::HandleCreation)?),
            EventKind::Generic(_) | EventKind::Mutex(_) => None,
            _ => Some(sys::sys_event_create().map_err(Error::HandleCreation)?),
        };

        let id = EventId(self.slab.insert(Event {
            kind,
            status: EventStatus::Pending,
            flags,
            handle,
        }));

        trace!("created {} event {:?}", self.record(id).kind.name(), id);
        Ok(id)
    }

    /// Current status of an event.
    pub fn status(&self, id: EventId) -> EventStatus {
        let _gate = gate::enter();
        self.record(id).status
    }

    /// Returns `true` if the event fired during the last wait pass.
    pub fn occurred(&self, id: EventId) -> bool {
        self.status(id) == EventStatus::Occurred
    }

    /// Mode flags of an event, including the implied
    /// until-readable/until-writable direction flags.
    pub fn flags(&self, id: EventId) -> EventFlags {
        let _gate = gate::enter();
        self.record(id).flags
    }

    /// The signal number delivered to a fired Signal-kind event, or
    /// `None` if the event has not fired (or is not Signal-kind).
    pub fn signal_number(&self, id: EventId) -> Option<i32> {
        let _gate = gate::enter();
        match self.record(id).kind {
            EventKind::Signal { signo, .. } => signo,
            _ => None,
        }
    }

    /// The outcome of a fired Select-kind event, or `None` if the
    /// event has not fired (or is not Select-kind).
    pub fn select_outcome(&self, id: EventId) -> Option<SelectOutcome<'_>> {
        let _gate = gate::enter();
        match &self.record(id).kind {
            EventKind::Select {
                rfds,
                wfds,
                efds,
                ready: Some(ready),
            } => Some(SelectOutcome {
                ready: *ready,
                rfds: rfds.as_ref(),
                wfds: wfds.as_ref(),
                efds: efds.as_ref(),
            }),
            _ => None,
        }
    }

    /// Frees one event, releasing its native resources.
    ///
    /// Timers are disarmed before their handle is closed; the
    /// borrowing kinds (Generic, Mutex) release nothing. Returns
    /// `false` if `id` no longer names a live event.
    pub fn free(&mut self, id: EventId) -> bool {
        let _gate = gate::enter();
        self.do_free(id)
    }

    /// Frees a whole ring, walking every member exactly once.
    pub fn free_ring(&mut self, ring: Ring) {
        let _gate = gate::enter();
        for &id in ring.members() {
            self.do_free(id);
        }
    }

    pub(crate) fn do_free(&mut self, id: EventId) -> bool {
        let Some(event) = self.slab.remove(id.0) else {
            debug!("free of stale event {:?} ignored", id);
            return false;
        };

        if let Some(handle) = event.handle {
            if matches!(event.kind, EventKind::Timer { .. }) {
                sys::sys_timer_disarm(handle);
            }
            sys::sys_close(handle);
        }

        trace!("freed {} event {:?}", event.kind.name(), id);
        true
    }

    /// Blocks until at least one member of `ring` fires.
    ///
    /// Returns the number of events that fired in this pass, `Ok(0)`
    /// for a native timeout with nothing signaled. The native blocking
    /// wait runs with the runtime gate released.
    pub fn wait(&mut self, ring: &Ring) -> Result<usize> {
        let mut gate = gate::enter();
        mux::do_wait(self, ring, &mut gate)
    }

    /// Number of live events in the arena.
    pub fn live(&self) -> usize {
        self.slab.len()
    }

    pub(crate) fn record(&self, id: EventId) -> &Event {
        self.slab.get(id.0).expect("stale event id")
    }

    pub(crate) fn record_mut(&mut self, id: EventId) -> &mut Event {
        self.slab.get_mut(id.0).expect("stale event id")
    }
}

impl Drop for Events {
    /// Releases the native resources of any events never freed
    /// explicitly.
    fn drop(&mut self) {
        for index in 0..self.slab.slots() {
            if self.slab.contains(index) {
                self.do_free(EventId(index));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native;
    use std::sync::Mutex;

    // Tests that assert on the process-wide handle counter must not
    // overlap each other.
    static COUNTER: Mutex<()> = Mutex::new(());

    #[test]
    fn whole_ring_free_releases_one_resource_per_member() {
        let _serial = COUNTER.lock().unwrap();
        let mut events = Events::new();

        let a = events.create(EventSpec::Timer { secs: 5, usecs: 0 }).unwrap();
        let b = events
            .create(EventSpec::Timer { secs: 10, usecs: 0 })
            .unwrap();
        let c = events.create(EventSpec::Signal(Default::default())).unwrap();

        let before = native::live_handles();

        let mut ring = Ring::from(a);
        ring.merge(Ring::from(b));
        ring.merge(Ring::from(c));
        events.free_ring(ring);

        assert_eq!(native::live_handles(), before - 3);
        assert_eq!(events.live(), 0);
    }

    #[test]
    fn borrowed_handles_are_not_released() {
        let _serial = COUNTER.lock().unwrap();
        let mut events = Events::new();

        // A handle the caller owns; the arena must not close it.
        let borrowed = crate::native::sys::sys_event_create().unwrap();
        let id = events.create(EventSpec::Generic(borrowed)).unwrap();

        let before = native::live_handles();
        assert!(events.free(id));
        assert_eq!(native::live_handles(), before);

        crate::native::sys::sys_close(borrowed);
    }

    #[test]
    fn static_key_is_accepted_and_reported() {
        let mut events = Events::new();

        let id = events
            .create_with_flags(
                EventSpec::Timer { secs: 1, usecs: 0 },
                EventFlags::STATIC_KEY,
            )
            .unwrap();

        assert!(events.flags(id).contains(EventFlags::STATIC_KEY));
        events.free(id);
    }

    #[test]
    fn unsupported_flags_are_rejected() {
        let mut events = Events::new();

        let err = events
            .create_with_flags(
                EventSpec::Timer { secs: 0, usecs: 0 },
                EventFlags::CHAIN,
            )
            .unwrap_err();

        assert!(matches!(err, Error::UnsupportedCombination(_)));
        assert_eq!(events.live(), 0);
    }
}
