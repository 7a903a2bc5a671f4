//! Arena of segment records backing a pool's address-ordered partition.
//!
//! A pool's address range is threaded as a doubly linked list, but the links
//! are indices into a dense [`Vec`] rather than pointers. This keeps every
//! segment's identity stable across arena growth (a `Vec` resize may move the
//! backing allocation, but never changes what an index means) and makes the
//! "set of live free segments" trivially enumerable for invariant checking.

use std::fmt;

/// Sentinel value for "no link" in `prev`/`next` chains.
const NONE: usize = usize::MAX;

/// Stable identity of a segment within its arena.
///
/// Carries a generation counter so a handle captured before a segment was
/// freed and its slot reused cannot silently resolve to the wrong segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentRef {
    pub(crate) index: usize,
    pub(crate) generation: u32,
}

impl fmt::Display for SegmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment#{}@gen{}", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct SegmentSlot {
    base: usize,
    size: usize,
    allocated: bool,
    prev: usize,
    next: usize,
    generation: u32,
    live: bool,
}

/// Dense arena of [`SegmentSlot`]s with a free-list of vacant slots.
///
/// `prev`/`next` are arena indices instead of pointers, and `head` tracks the
/// lowest-address live segment so the list can be walked in address order.
pub struct SegmentArena {
    slots: Vec<SegmentSlot>,
    free_slots: Vec<usize>,
    head: usize,
    live_count: usize,
}

impl SegmentArena {
    /// Creates an arena with one live segment covering `[0, total_size)`.
    pub fn new(initial_capacity: usize, total_size: usize) -> Self {
        let mut slots = Vec::with_capacity(initial_capacity.max(1));
        slots.push(SegmentSlot {
            base: 0,
            size: total_size,
            allocated: false,
            prev: NONE,
            next: NONE,
            generation: 0,
            live: true,
        });
        Self {
            slots,
            free_slots: Vec::new(),
            head: 0,
            live_count: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Fraction of allocated slots currently in use, for the 0.75 growth trigger.
    pub fn occupancy(&self) -> f64 {
        if self.slots.capacity() == 0 {
            return 1.0;
        }
        self.live_count as f64 / self.slots.capacity() as f64
    }

    /// Doubles backing storage. Returns `false` if the allocator refuses growth.
    #[must_use]
    pub fn try_grow(&mut self) -> bool {
        let additional = self.slots.capacity().max(1);
        self.slots.try_reserve(additional).is_ok()
    }

    fn reference(&self, index: usize) -> SegmentRef {
        SegmentRef {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Resolves a [`SegmentRef`] to its current index, rejecting stale handles.
    pub fn resolve(&self, seg: SegmentRef) -> Option<usize> {
        let slot = self.slots.get(seg.index)?;
        if slot.live && slot.generation == seg.generation {
            Some(seg.index)
        } else {
            None
        }
    }

    pub fn base(&self, index: usize) -> usize {
        self.slots[index].base
    }

    pub fn size(&self, index: usize) -> usize {
        self.slots[index].size
    }

    pub fn is_allocated(&self, index: usize) -> bool {
        self.slots[index].allocated
    }

    /// The segment's successor in address order, free or allocated.
    pub fn next(&self, index: usize) -> Option<usize> {
        let next = self.slots[index].next;
        (next != NONE).then_some(next)
    }

    /// The segment's predecessor in address order, free or allocated.
    pub fn prev(&self, index: usize) -> Option<usize> {
        let prev = self.slots[index].prev;
        (prev != NONE).then_some(prev)
    }

    /// Flips an allocated segment back to free. Inverse of `consume_exact`/`split`'s
    /// allocated-prefix transition; used by the free path.
    ///
    /// Bumps the slot's generation so a handle to the released allocation
    /// stops resolving even if the same index is allocated again in place
    /// (e.g. a later `consume_exact` on this same slot).
    pub fn free_allocated(&mut self, index: usize) {
        debug_assert!(self.slots[index].allocated);
        self.slots[index].allocated = false;
        self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
    }

    /// Iterates live segments from lowest to highest `base`.
    pub fn iter_ordered(&self) -> impl Iterator<Item = usize> + '_ {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            if cur == NONE {
                return None;
            }
            let here = cur;
            cur = self.slots[here].next;
            Some(here)
        })
    }

    fn alloc_slot(&mut self, slot: SegmentSlot) -> usize {
        if let Some(idx) = self.free_slots.pop() {
            // `generation` was already bumped by `free_slot` when this slot
            // was vacated; reusing it here keeps handles from the previous
            // occupant of this index from resolving.
            let generation = self.slots[idx].generation;
            self.slots[idx] = SegmentSlot { generation, ..slot };
            self.live_count += 1;
            idx
        } else {
            self.slots.push(slot);
            self.live_count += 1;
            self.slots.len() - 1
        }
    }

    /// Splits a free segment `s` of size `s.size > k` into an allocated prefix
    /// of size `k` and a free remainder, returning the remainder's reference.
    pub fn split(&mut self, index: usize, k: usize) -> SegmentRef {
        debug_assert!(!self.slots[index].allocated);
        debug_assert!(self.slots[index].size > k);

        let remainder_base = self.slots[index].base + k;
        let remainder_size = self.slots[index].size - k;
        let old_next = self.slots[index].next;

        let remainder_idx = self.alloc_slot(SegmentSlot {
            base: remainder_base,
            size: remainder_size,
            allocated: false,
            prev: index,
            next: old_next,
            generation: 0,
            live: true,
        });

        if old_next != NONE {
            self.slots[old_next].prev = remainder_idx;
        }
        self.slots[index].next = remainder_idx;
        self.slots[index].size = k;
        self.slots[index].allocated = true;

        self.reference(remainder_idx)
    }

    /// Flips a free segment whose size exactly matches the request to allocated.
    pub fn consume_exact(&mut self, index: usize) {
        debug_assert!(!self.slots[index].allocated);
        self.slots[index].allocated = true;
    }

    /// Merges `index` with its free successor, freeing the successor's slot.
    pub fn coalesce_with_next(&mut self, index: usize) {
        let next = self.slots[index].next;
        debug_assert_ne!(next, NONE);
        debug_assert!(!self.slots[next].allocated);

        self.slots[index].size += self.slots[next].size;
        let after = self.slots[next].next;
        self.slots[index].next = after;
        if after != NONE {
            self.slots[after].prev = index;
        }
        self.free_slot(next);
    }

    /// Merges `index` with its free predecessor; the predecessor's identity survives.
    pub fn coalesce_with_prev(&mut self, index: usize) -> usize {
        let prev = self.slots[index].prev;
        debug_assert_ne!(prev, NONE);
        debug_assert!(!self.slots[prev].allocated);

        self.slots[prev].size += self.slots[index].size;
        let after = self.slots[index].next;
        self.slots[prev].next = after;
        if after != NONE {
            self.slots[after].prev = prev;
        }
        self.free_slot(index);
        prev
    }

    fn free_slot(&mut self, index: usize) {
        if self.head == index {
            self.head = self.slots[index].next;
        }
        self.slots[index].live = false;
        self.slots[index].generation = self.slots[index].generation.wrapping_add(1);
        self.live_count -= 1;
        self.free_slots.push(index);
    }

    pub fn make_ref(&self, index: usize) -> SegmentRef {
        self.reference(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_arena_is_one_free_segment() {
        let arena = SegmentArena::new(40, 1000);
        let order: Vec<usize> = arena.iter_ordered().collect();
        assert_eq!(order, vec![0]);
        assert_eq!(arena.base(0), 0);
        assert_eq!(arena.size(0), 1000);
        assert!(!arena.is_allocated(0));
    }

    #[test]
    fn split_produces_address_ordered_neighbor() {
        let mut arena = SegmentArena::new(40, 1000);
        let remainder = arena.split(0, 100);
        assert_eq!(arena.base(0), 0);
        assert_eq!(arena.size(0), 100);
        assert!(arena.is_allocated(0));
        let r = arena.resolve(remainder).unwrap();
        assert_eq!(arena.base(r), 100);
        assert_eq!(arena.size(r), 900);
        assert!(!arena.is_allocated(r));
    }

    #[test]
    fn coalesce_with_next_merges_sizes() {
        let mut arena = SegmentArena::new(40, 1000);
        let remainder = arena.split(0, 100);
        let r = arena.resolve(remainder).unwrap();
        // coalesce_with_next only cares that the next segment is free, not
        // whether `index` itself is allocated.
        arena.coalesce_with_next(0);
        let _ = r;
        assert_eq!(arena.size(0), 1000);
        assert_eq!(arena.iter_ordered().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn stale_reference_does_not_resolve() {
        let mut arena = SegmentArena::new(40, 1000);
        let remainder = arena.split(0, 100);
        let r = arena.resolve(remainder).unwrap();
        arena.coalesce_with_next(0);
        assert!(arena.resolve(SegmentRef { index: r, generation: remainder.generation }).is_none());
    }
}
