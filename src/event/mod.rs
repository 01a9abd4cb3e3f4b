//! Events, the arena that stores them, and ring composition.
//!
//! An [`Event`](record::Event) is one wait condition: a kind-specific
//! payload, a status, and the native resource backing it. Events live
//! in an index-addressed arena ([`Events`]); callers hold [`EventId`]
//! indices and compose them into a [`Ring`] for one combined wait.
//!
//! Rings are plain lists of indices, so merging and isolating members
//! never rewrites linkage inside the records themselves.

mod arena;
mod record;
mod ring;

pub use arena::{EventId, Events, SelectOutcome};
pub use record::{EventFlags, EventSpec, EventStatus, SignalSet};
pub use ring::Ring;

pub(crate) use record::EventKind;
