//! The pool manager: owns a backing buffer, its segment arena, its gap
//! index, and the counters that describe them.

use std::fmt;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::gap_index::GapIndex;
use crate::policy::PlacementPolicy;
use crate::segment::{SegmentArena, SegmentRef};

/// Opaque reference to a single live allocation within a [`Pool`].
///
/// `base` and `size` are cached at allocation time; they are stable for the
/// lifetime of the allocation because a live allocated segment never moves
/// or resizes until it is freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationHandle {
    segment: SegmentRef,
    base: usize,
    size: usize,
}

impl AllocationHandle {
    /// Byte offset of this allocation within the pool's backing buffer.
    pub fn base_pointer(&self) -> usize {
        self.base
    }

    /// Size of this allocation in bytes.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for AllocationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alloc@{}+{}", self.base, self.size)
    }
}

/// One entry of an [`inspect`](Pool::inspect) report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentView {
    /// Size of the segment in bytes.
    pub size: usize,
    /// Whether the segment is currently allocated.
    pub allocated: bool,
}

/// A single open pool: a fixed-size buffer partitioned into allocated blocks
/// and free gaps, plus the parallel structures (arena, gap index) that keep
/// allocation and coalescing cheap.
pub struct Pool {
    buffer: Vec<u8>,
    config: PoolConfig,
    arena: SegmentArena,
    gaps: GapIndex,
    num_allocs: usize,
    alloc_size: usize,
}

/// Returned by [`Pool::close`] when the pool still has live allocations or
/// more than one gap; hands the pool back unchanged so the caller can keep
/// using it.
pub struct ClosePoolError {
    /// The pool, returned unchanged.
    pub pool: Pool,
    /// Why `close` refused.
    pub source: PoolError,
}

impl fmt::Debug for ClosePoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosePoolError")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ClosePoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

impl std::error::Error for ClosePoolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl Pool {
    /// Opens a new pool with one free segment covering `[0, config.total_size)`.
    ///
    /// Fails only if the backing buffer or initial internal arrays cannot be
    /// allocated.
    pub fn open(config: PoolConfig) -> Result<Self, PoolError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(config.total_size)
            .map_err(|_| PoolError::OutOfMemory {
                requested: config.total_size,
            })?;
        buffer.resize(config.total_size, 0);

        let arena = SegmentArena::new(config.initial_segment_capacity, config.total_size);
        let mut gaps = GapIndex::new(config.initial_gap_capacity);
        gaps.insert(config.total_size, 0, 0);

        tracing::debug!(total_size = config.total_size, policy = ?config.policy, "pool opened");

        Ok(Self {
            buffer,
            config,
            arena,
            gaps,
            num_allocs: 0,
            alloc_size: 0,
        })
    }

    /// Total size of the pool's backing buffer.
    pub fn total_size(&self) -> usize {
        self.config.total_size
    }

    /// Number of currently live allocations.
    pub fn num_allocs(&self) -> usize {
        self.num_allocs
    }

    /// Sum of the sizes of currently live allocations.
    pub fn alloc_size(&self) -> usize {
        self.alloc_size
    }

    /// Number of currently free segments.
    pub fn num_gaps(&self) -> usize {
        self.gaps.len()
    }

    /// Current capacity of the gap index, for observing growth behavior.
    pub fn gap_index_capacity(&self) -> usize {
        self.gaps.capacity()
    }

    /// Current capacity of the segment arena, for observing growth behavior.
    pub fn segment_arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Placement policy this pool was opened with.
    pub fn policy(&self) -> PlacementPolicy {
        self.config.policy
    }

    /// Allocates `requested_size` bytes, splitting a free segment per the
    /// pool's placement policy.
    pub fn allocate(&mut self, requested_size: usize) -> Result<AllocationHandle, PoolError> {
        debug_assert!(requested_size > 0, "allocate() requires a positive size");

        if self.arena.occupancy() > self.config.fill_factor && !self.arena.try_grow() {
            tracing::warn!(requested_size, "segment arena growth failed");
            return Err(PoolError::OutOfMemory {
                requested: requested_size,
            });
        }

        let selected = match self.config.policy {
            PlacementPolicy::FirstFit => self.gaps.first_free_sufficient(requested_size),
            PlacementPolicy::BestFit => self.gaps.best_fit(requested_size),
        };

        let Some(g) = selected else {
            tracing::warn!(requested_size, "no free segment large enough");
            return Err(PoolError::NoFit {
                requested: requested_size,
            });
        };

        let g_base = self.arena.base(g);
        let g_size = self.arena.size(g);

        self.gaps.remove(g);
        let segment = if g_size == requested_size {
            self.arena.consume_exact(g);
            self.arena.make_ref(g)
        } else {
            let remainder = self.arena.split(g, requested_size);
            let r_idx = self
                .arena
                .resolve(remainder)
                .expect("split() always returns a freshly live reference");
            self.gaps
                .insert(self.arena.size(r_idx), self.arena.base(r_idx), r_idx);
            self.arena.make_ref(g)
        };

        self.num_allocs += 1;
        self.alloc_size += requested_size;

        tracing::debug!(base = g_base, size = requested_size, "allocated");

        Ok(AllocationHandle {
            segment,
            base: g_base,
            size: requested_size,
        })
    }

    /// Frees a previously allocated handle, coalescing with free neighbors.
    pub fn free(&mut self, handle: AllocationHandle) -> Result<(), PoolError> {
        let Some(idx) = self.arena.resolve(handle.segment) else {
            tracing::warn!(handle = %handle, "free() on a stale or foreign handle");
            return Err(PoolError::BadHandle);
        };
        if !self.arena.is_allocated(idx) {
            return Err(PoolError::BadHandle);
        }

        let next_free = self
            .arena
            .next(idx)
            .is_some_and(|n| !self.arena.is_allocated(n));
        let prev_free = self
            .arena
            .prev(idx)
            .is_some_and(|p| !self.arena.is_allocated(p));

        // Coalescing with a free neighbor removes an existing gap entry
        // before inserting the merged one, so the gap index can only grow a
        // net new entry when neither neighbor is free. Check capacity before
        // touching any state, so a growth refusal is a clean no-op.
        if !next_free
            && !prev_free
            && self.gaps.occupancy() > self.config.fill_factor
            && !self.gaps.try_grow()
        {
            tracing::warn!(
                requested = self.arena.size(idx),
                "gap index growth failed for free()"
            );
            return Err(PoolError::OutOfMemory {
                requested: self.arena.size(idx),
            });
        }

        self.num_allocs -= 1;
        self.alloc_size -= self.arena.size(idx);

        // Flip back to free before coalescing so the neighbor checks below
        // see a consistent segment.
        self.arena.free_allocated(idx);

        let mut merged = idx;
        if next_free {
            let next = self.arena.next(merged).expect("next_free implies a next neighbor");
            self.gaps.remove(next);
            self.arena.coalesce_with_next(merged);
        }
        if prev_free {
            let prev = self.arena.prev(merged).expect("prev_free implies a prev neighbor");
            self.gaps.remove(prev);
            merged = self.arena.coalesce_with_prev(merged);
        }

        self.gaps
            .insert(self.arena.size(merged), self.arena.base(merged), merged);

        tracing::debug!(base = self.arena.base(merged), "freed");
        Ok(())
    }

    /// Ordered, read-only view of every segment from lowest to highest address.
    pub fn inspect(&self) -> Vec<SegmentView> {
        self.arena
            .iter_ordered()
            .map(|idx| SegmentView {
                size: self.arena.size(idx),
                allocated: self.arena.is_allocated(idx),
            })
            .collect()
    }

    /// Raw bytes backing a live allocation.
    ///
    /// Beyond the base/size bookkeeping a handle otherwise carries, but the
    /// buffer genuinely holds the pool's storage and a caller already
    /// holding a valid handle is entitled to the bytes it names.
    pub fn as_slice(&self, handle: AllocationHandle) -> Option<&[u8]> {
        let idx = self.arena.resolve(handle.segment)?;
        if !self.arena.is_allocated(idx) {
            return None;
        }
        let base = self.arena.base(idx);
        let size = self.arena.size(idx);
        Some(&self.buffer[base..base + size])
    }

    /// Mutable view of the bytes backing a live allocation.
    pub fn as_slice_mut(&mut self, handle: AllocationHandle) -> Option<&mut [u8]> {
        let idx = self.arena.resolve(handle.segment)?;
        if !self.arena.is_allocated(idx) {
            return None;
        }
        let base = self.arena.base(idx);
        let size = self.arena.size(idx);
        Some(&mut self.buffer[base..base + size])
    }

    /// Closes the pool if it has no live allocations and exactly one gap.
    /// On failure the pool is handed back unchanged.
    pub fn close(self) -> Result<(), ClosePoolError> {
        if self.num_allocs != 0 || self.num_gaps() != 1 {
            let source = PoolError::NotEmpty {
                num_allocs: self.num_allocs,
                num_gaps: self.num_gaps(),
            };
            tracing::warn!(num_allocs = self.num_allocs, num_gaps = self.num_gaps(), "close refused: pool not empty");
            return Err(ClosePoolError { pool: self, source });
        }
        tracing::debug!("pool closed");
        Ok(())
    }
}
