//! Descriptor sets and interest masks for select-style events.
//!
//! A [`FdSet`] is the portable equivalent of the classic `fd_set`: a
//! small, duplicate-free list of descriptors. [`merge_interest`]
//! deduplicates up to three such sets (read/write/except) into a table
//! of per-descriptor merged interest masks, which the adapters turn
//! into a single aggregate readiness registration.

use crate::native::Fd;

use bitflags::bitflags;

bitflags! {
    /// Readiness interest (or observed activity) for one descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FdInterest: u8 {
        /// Readable data, or a connection ready to accept.
        const READ = 0b001;
        /// Writable without blocking.
        const WRITE = 0b010;
        /// Exceptional condition (out-of-band data, peer close).
        const EXCEPT = 0b100;
    }
}

/// A set of descriptors with `fd_set`-like semantics.
///
/// Insertion order is preserved; duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FdSet {
    fds: Vec<Fd>,
}

impl FdSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { fds: Vec::new() }
    }

    /// Adds a descriptor to the set. Adding a descriptor twice is a no-op.
    pub fn insert(&mut self, fd: Fd) {
        if !self.fds.contains(&fd) {
            self.fds.push(fd);
        }
    }

    /// Returns `true` if `fd` is a member of the set.
    pub fn contains(&self, fd: Fd) -> bool {
        self.fds.contains(&fd)
    }

    /// Removes every descriptor from the set.
    pub fn clear(&mut self) {
        self.fds.clear();
    }

    /// Number of descriptors in the set.
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Returns `true` if the set holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Iterates over the member descriptors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = Fd> + '_ {
        self.fds.iter().copied()
    }
}

impl FromIterator<Fd> for FdSet {
    fn from_iter<I: IntoIterator<Item = Fd>>(iter: I) -> Self {
        let mut set = FdSet::new();
        for fd in iter {
            set.insert(fd);
        }
        set
    }
}

/// One entry of a merged-interest table: a unique descriptor and the
/// union of the interests requested for it across all input sets.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FdEntry {
    pub(crate) fd: Fd,
    pub(crate) mask: FdInterest,
}

/// Folds `set` into `table`, OR-ing `mask` into existing entries and
/// appending new ones. Each descriptor appears in the table exactly
/// once no matter how many sets reference it.
pub(crate) fn merge_interest(table: &mut Vec<FdEntry>, set: Option<&FdSet>, mask: FdInterest) {
    let Some(set) = set else {
        return;
    };

    for fd in set.iter() {
        if let Some(entry) = table.iter_mut().find(|e| e.fd == fd) {
            entry.mask |= mask;
        } else {
            table.push(FdEntry { fd, mask });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_duplicate_free() {
        let mut set = FdSet::new();
        set.insert(3);
        set.insert(3);
        set.insert(5);

        assert_eq!(set.len(), 2);
        assert!(set.contains(3));
        assert!(set.contains(5));
    }

    #[test]
    fn merge_unions_masks_per_descriptor() {
        let rfds: FdSet = [4, 7].into_iter().collect();
        let wfds: FdSet = [7, 9].into_iter().collect();

        let mut table = Vec::new();
        merge_interest(&mut table, Some(&rfds), FdInterest::READ);
        merge_interest(&mut table, Some(&wfds), FdInterest::WRITE);
        merge_interest(&mut table, None, FdInterest::EXCEPT);

        assert_eq!(table.len(), 3);

        let seven = table.iter().find(|e| e.fd == 7).unwrap();
        assert_eq!(seven.mask, FdInterest::READ | FdInterest::WRITE);

        let four = table.iter().find(|e| e.fd == 4).unwrap();
        assert_eq!(four.mask, FdInterest::READ);

        let nine = table.iter().find(|e| e.fd == 9).unwrap();
        assert_eq!(nine.mask, FdInterest::WRITE);
    }
}
