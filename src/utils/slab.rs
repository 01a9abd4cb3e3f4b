//! A simple slab allocator.
//!
//! A `Slab` stores values of type `T` in a contiguous array and returns
//! stable indices that can be reused after removal. It backs the event
//! arena: rings address their members by slab index, so concat and
//! isolate never touch the stored records themselves.

pub(crate) struct Slab<T> {
    /// Storage for items; `None` marks a free slot.
    items: Vec<Option<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
}

impl<T> Slab<T> {
    /// Creates an empty slab.
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Inserts a value into the slab and returns its index.
    ///
    /// Free slots are reused before the storage grows.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        if let Some(index) = self.free.pop() {
            self.items[index] = Some(item);
            index
        } else {
            self.items.push(Some(item));
            self.items.len() - 1
        }
    }

    /// Removes and returns the value stored at `index`, or `None` if
    /// the slot is free or out of range.
    pub(crate) fn remove(&mut self, index: usize) -> Option<T> {
        let item = self.items.get_mut(index)?.take()?;
        self.free.push(index);
        Some(item)
    }

    /// Returns a reference to the value at `index`.
    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)?.as_ref()
    }

    /// Returns a mutable reference to the value at `index`.
    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)?.as_mut()
    }

    /// Returns `true` if `index` names a live slot.
    pub(crate) fn contains(&self, index: usize) -> bool {
        matches!(self.items.get(index), Some(Some(_)))
    }

    /// Number of live slots.
    pub(crate) fn len(&self) -> usize {
        self.items.len() - self.free.len()
    }

    /// Total number of slots, free ones included. Live indices are
    /// always below this bound.
    pub(crate) fn slots(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_reused() {
        let mut slab = Slab::new();
        let a = slab.insert("a");
        let b = slab.insert("b");

        assert_eq!(slab.remove(a), Some("a"));
        assert!(!slab.contains(a));

        let c = slab.insert("c");
        assert_eq!(c, a);
        assert_eq!(slab.get(b), Some(&"b"));
        assert_eq!(slab.len(), 2);
    }

    #[test]
    fn double_remove_is_none() {
        let mut slab = Slab::new();
        let a = slab.insert(1);
        assert_eq!(slab.remove(a), Some(1));
        assert_eq!(slab.remove(a), None);
    }
}
