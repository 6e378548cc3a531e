//! Id allocation: smallest-free-first pools with switch-declared maxima.

use crate::error::{Error, Item};
use std::collections::{BTreeMap, BTreeSet};

/// An id pool: a monotone counter plus a sorted free list.
///
/// `alloc` returns the smallest freed id if any exist, else the next fresh id. The sorted
/// free list makes allocation deterministic, so test expectations stay stable.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IdAllocator {
    item: Item,
    start: u32,
    next: u32,
    limit: u32,
    free: BTreeSet<u32>,
}

impl IdAllocator {
    /// A pool starting at `start` with no effective maximum.
    pub fn new(item: Item, start: u32) -> Self {
        Self {
            item,
            start,
            next: start,
            limit: u32::MAX,
            free: BTreeSet::new(),
        }
    }

    /// Set the highest id this pool may hand out.
    ///
    /// Called when the switch reports its pool sizes; ids already handed out are unaffected.
    pub fn set_max(&mut self, max: u32) {
        self.limit = max.saturating_add(1);
    }

    /// Set the exclusive upper bound of the pool; a limit equal to the start empties it.
    pub(crate) fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
    }

    /// Allocate the smallest available id.
    pub fn alloc(&mut self) -> Result<u32, Error> {
        if let Some(id) = self.free.pop_first() {
            return Ok(id);
        }

        if self.next >= self.limit {
            return Err(Error::ResourceExhausted(self.item));
        }

        let id = self.next;
        self.next += 1;

        Ok(id)
    }

    /// Return `id` to the pool.
    pub fn release(&mut self, id: u32) {
        if id >= self.start && id < self.next {
            self.free.insert(id);
        }
    }

    /// Mark `id` as handed out, e.g. when repopulating from a snapshot.
    ///
    /// Ids skipped over on the way become free, preserving smallest-first allocation.
    pub(crate) fn reserve(&mut self, id: u32) {
        if id >= self.next {
            for skipped in self.next..id {
                self.free.insert(skipped);
            }

            self.next = id + 1;
        } else {
            self.free.remove(&id);
        }
    }

    /// The freed ids, ascending.
    pub fn free_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.free.iter().copied()
    }

    /// Number of ids currently held by callers.
    pub fn used(&self) -> usize {
        (self.next - self.start) as usize - self.free.len()
    }
}

/// An id pool plus the last-known record for each live id.
///
/// Counters, meters and groups all follow this shape: the controller allocates an id,
/// remembers the definition it sent, and frees the id when the object is deleted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DataTable<T> {
    alloc: IdAllocator,
    entries: BTreeMap<u32, T>,
}

impl<T> DataTable<T> {
    /// A table whose ids start at `start`.
    pub fn new(item: Item, start: u32) -> Self {
        Self {
            alloc: IdAllocator::new(item, start),
            entries: BTreeMap::new(),
        }
    }

    /// Cap the pool at `max` ids.
    pub fn set_max(&mut self, max: u32) {
        self.alloc.set_max(max);
    }

    /// Allocate an id without storing a record yet.
    pub fn alloc(&mut self) -> Result<u32, Error> {
        self.alloc.alloc()
    }

    /// Store (or replace) the record for `id`.
    pub fn put(&mut self, id: u32, value: T) {
        self.entries.insert(id, value);
    }

    /// The record for `id`, if live.
    pub fn get(&self, id: u32) -> Option<&T> {
        self.entries.get(&id)
    }

    /// Mutable access to the record for `id`.
    pub fn get_mut(&mut self, id: u32) -> Option<&mut T> {
        self.entries.get_mut(&id)
    }

    /// Remove `id`, returning its record and freeing the id.
    pub fn remove(&mut self, id: u32) -> Option<T> {
        let value = self.entries.remove(&id)?;

        self.alloc.release(id);

        Some(value)
    }

    /// All live records in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// All live ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_is_monotone_from_start() {
        let mut pool = IdAllocator::new(Item::Counter, 1);

        assert_eq!(pool.alloc().unwrap(), 1);
        assert_eq!(pool.alloc().unwrap(), 2);
        assert_eq!(pool.alloc().unwrap(), 3);
    }

    #[test]
    fn freed_ids_are_reused_smallest_first() {
        let mut pool = IdAllocator::new(Item::FlowEntry, 0);

        for _ in 0..5 {
            pool.alloc().unwrap();
        }

        pool.release(3);
        pool.release(1);

        assert_eq!(pool.alloc().unwrap(), 1);
        assert_eq!(pool.alloc().unwrap(), 3);
        assert_eq!(pool.alloc().unwrap(), 5);
    }

    #[test]
    fn freed_id_never_collides_with_live_ids() {
        let mut pool = IdAllocator::new(Item::FlowEntry, 0);
        let mut live = std::collections::BTreeSet::new();

        for _ in 0..8 {
            live.insert(pool.alloc().unwrap());
        }

        for id in [2, 4, 6] {
            live.remove(&id);
            pool.release(id);
        }

        for _ in 0..3 {
            let id = pool.alloc().unwrap();

            assert!(live.insert(id), "id {} was already live", id);
        }

        assert_eq!(pool.alloc().unwrap(), 8);
    }

    #[test]
    fn max_is_enforced() {
        let mut pool = IdAllocator::new(Item::Counter, 1);
        pool.set_max(2);

        assert_eq!(pool.alloc().unwrap(), 1);
        assert_eq!(pool.alloc().unwrap(), 2);
        assert_eq!(pool.alloc(), Err(Error::ResourceExhausted(Item::Counter)));

        // Freeing makes room again.
        pool.release(1);
        assert_eq!(pool.alloc().unwrap(), 1);
    }

    #[test]
    fn release_ignores_ids_never_handed_out() {
        let mut pool = IdAllocator::new(Item::Counter, 1);

        pool.alloc().unwrap();
        pool.release(42);

        assert_eq!(pool.alloc().unwrap(), 2);
    }

    #[test]
    fn data_table_tracks_records() {
        let mut table = DataTable::<&'static str>::new(Item::Meter, 1);

        let id = table.alloc().unwrap();
        table.put(id, "m1");

        assert_eq!(table.get(id), Some(&"m1"));
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove(id), Some("m1"));
        assert!(table.is_empty());

        // Freed id comes back.
        assert_eq!(table.alloc().unwrap(), id);
    }
}
