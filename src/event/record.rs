//! Event records: one wait condition plus its status and native resource.

use crate::fdset::FdSet;
use crate::native::{Fd, Handle};

use bitflags::bitflags;

bitflags! {
    /// Mode flags further describing an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventFlags: u32 {
        /// The event lives in a caller-managed static slot and is
        /// reused across calls. Accepted and reported back through
        /// [`Events::flags`](super::Events::flags), but inert:
        /// creation always builds a fresh event.
        const STATIC_KEY = 0b00001;
        /// Descriptor event waits for readability (set implicitly by
        /// [`EventSpec::FdReadable`](super::EventSpec::FdReadable)).
        const UNTIL_READABLE = 0b00010;
        /// Descriptor event waits for writability (set implicitly by
        /// [`EventSpec::FdWritable`](super::EventSpec::FdWritable)).
        const UNTIL_WRITABLE = 0b00100;
        /// Chained event construction. Not supported.
        const CHAIN = 0b01000;
        /// Event object reuse. Not supported.
        const REUSE = 0b10000;
    }
}

impl EventFlags {
    /// Flags that are rejected at creation time.
    pub(crate) const UNSUPPORTED: EventFlags = EventFlags::CHAIN.union(EventFlags::REUSE);
}

/// Current status of an event.
///
/// Every multiplexer pass starts by resetting all ring members to
/// `Pending`; only the multiplexer itself moves an event to `Occurred`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    /// The condition has not been observed yet.
    Pending,
    /// The condition fired during the last wait pass.
    Occurred,
}

/// A set of signal numbers a Signal-kind event is interested in.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    sigs: Vec<i32>,
}

impl SignalSet {
    /// Creates an empty signal set.
    pub fn new() -> Self {
        Self { sigs: Vec::new() }
    }

    /// Adds a signal number to the set.
    pub fn add(&mut self, signo: i32) {
        if !self.sigs.contains(&signo) {
            self.sigs.push(signo);
        }
    }

    /// Returns `true` if `signo` is a member of the set.
    pub fn contains(&self, signo: i32) -> bool {
        self.sigs.contains(&signo)
    }

    /// Returns `true` if no signal number was added. An empty set
    /// matches any delivered signal.
    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }
}

/// The condition an event waits for, with the required inputs per kind.
///
/// This is the construction-side view; output slots (the delivered
/// signal number, the filtered select sets) live inside the arena and
/// are read back through [`Events`](super::Events) accessors after a
/// wait.
#[derive(Debug, Clone)]
pub enum EventSpec {
    /// The descriptor has readable data (or a connection to accept).
    FdReadable(Fd),
    /// The descriptor is writable without blocking.
    FdWritable(Fd),
    /// A relative duration has elapsed. A zero duration fires on the
    /// first wait.
    Timer { secs: u64, usecs: u64 },
    /// One of the signals in the set has been delivered.
    Signal(SignalSet),
    /// Classic multi-descriptor readiness: any of up to three sets
    /// (read / write / except) has matching activity.
    Select {
        rfds: Option<FdSet>,
        wfds: Option<FdSet>,
        efds: Option<FdSet>,
    },
    /// The given mutex handle is free. Cannot be combined with other
    /// kinds in one ring; the handle is borrowed, never released.
    Mutex(Handle),
    /// A caller-owned native wait handle. Borrowed, never released.
    Generic(Handle),
}

impl EventSpec {
    /// Timer spec from a [`Duration`](std::time::Duration).
    pub fn timer(duration: std::time::Duration) -> Self {
        EventSpec::Timer {
            secs: duration.as_secs(),
            usecs: duration.subsec_micros() as u64,
        }
    }
}

/// Kind-specific payload, including the output slots filled when the
/// event fires.
#[derive(Debug)]
pub(crate) enum EventKind {
    FdReadable(Fd),
    FdWritable(Fd),
    Timer {
        secs: u64,
        usecs: u64,
    },
    Signal {
        set: SignalSet,
        /// Filled with the pending signal number when the event fires.
        signo: Option<i32>,
    },
    Select {
        rfds: Option<FdSet>,
        wfds: Option<FdSet>,
        efds: Option<FdSet>,
        /// Filled with the total count of active descriptors on fire.
        ready: Option<usize>,
    },
    Mutex(Handle),
    Generic(Handle),
}

impl EventKind {
    /// Short name used in log messages.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            EventKind::FdReadable(_) => "fd-readable",
            EventKind::FdWritable(_) => "fd-writable",
            EventKind::Timer { .. } => "timer",
            EventKind::Signal { .. } => "signal",
            EventKind::Select { .. } => "select",
            EventKind::Mutex(_) => "mutex",
            EventKind::Generic(_) => "generic",
        }
    }
}

/// One wait condition stored in the arena.
#[derive(Debug)]
pub(crate) struct Event {
    pub(crate) kind: EventKind,
    pub(crate) status: EventStatus,
    pub(crate) flags: EventFlags,
    /// Owned native signal or timer object. `None` for the kinds that
    /// borrow a caller handle (Generic, Mutex).
    pub(crate) handle: Option<Handle>,
}
