//! Ring composition over event indices.

use super::arena::EventId;

use log::debug;

/// A set of events composed for one combined wait.
///
/// A ring is never empty: it starts as a singleton and only grows by
/// merging other rings in. Member order is irrelevant for firing
/// detection; it only fixes the staging order for diagnostics.
///
/// A ring is owned by the thread that builds it. The global gate
/// serializes emulation-layer bookkeeping, but it does not make one
/// ring safe to mutate from two threads at once.
#[derive(Debug, Clone)]
pub struct Ring {
    members: Vec<EventId>,
}

impl From<EventId> for Ring {
    /// Creates a singleton ring.
    fn from(id: EventId) -> Self {
        Self { members: vec![id] }
    }
}

impl Ring {
    /// Splices another ring into this one.
    ///
    /// Works for multi-member rings on both sides, not just
    /// singletons. An event already present in this ring is not added
    /// twice.
    pub fn merge(&mut self, other: Ring) {
        for id in other.members {
            if self.members.contains(&id) {
                debug!("ring merge: event {:?} already a member, skipping", id);
            } else {
                self.members.push(id);
            }
        }
    }

    /// Removes `id` from this ring, leaving it on its own.
    ///
    /// Returns the now-singleton ring holding `id`; the remaining
    /// members stay in `self`. Returns `None` when `id` is not a
    /// member or is already alone (a ring cannot become empty).
    pub fn isolate(&mut self, id: EventId) -> Option<Ring> {
        if self.members.len() < 2 {
            return None;
        }

        let pos = self.members.iter().position(|&m| m == id)?;
        self.members.remove(pos);
        Some(Ring::from(id))
    }

    /// Returns `true` if `id` is a member of this ring.
    pub fn contains(&self, id: EventId) -> bool {
        self.members.contains(&id)
    }

    /// Number of member events.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the ring holds a single event.
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// The member indices in staging order.
    pub fn members(&self) -> &[EventId] {
        &self.members
    }
}
