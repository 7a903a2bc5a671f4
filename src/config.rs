//! Configuration for pools and the pool registry.

use crate::policy::PlacementPolicy;

/// Default initial capacity for a pool's segment arena and gap index.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 40;
/// Default initial capacity for a pool's gap index.
pub const DEFAULT_GAP_CAPACITY: usize = 40;
/// Default initial capacity for the pool registry.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 20;
/// Occupancy above which an internal array grows.
pub const DEFAULT_FILL_FACTOR: f64 = 0.75;
/// Factor by which an internal array grows once its fill factor is exceeded.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Configuration for a single pool.
///
/// `PoolConfig::new` uses the defaults above; `with_capacity_hints` lets
/// callers tune the initial capacities for tests and benchmarks that need to
/// exercise growth without allocating a pool large enough to hit it
/// naturally.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolConfig {
    /// Total size of the pool's backing buffer in bytes.
    pub total_size: usize,
    /// Placement policy used by `allocate`.
    pub policy: PlacementPolicy,
    /// Initial capacity of the segment arena.
    pub initial_segment_capacity: usize,
    /// Initial capacity of the gap index.
    pub initial_gap_capacity: usize,
    /// Occupancy fraction above which internal arrays grow.
    pub fill_factor: f64,
}

impl PoolConfig {
    /// A pool configuration using the default capacities and fill factor.
    #[must_use]
    pub fn new(total_size: usize, policy: PlacementPolicy) -> Self {
        Self {
            total_size,
            policy,
            initial_segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            initial_gap_capacity: DEFAULT_GAP_CAPACITY,
            fill_factor: DEFAULT_FILL_FACTOR,
        }
    }

    /// Overrides the initial segment-arena and gap-index capacities.
    ///
    /// Intended for tests and benchmarks that need to force growth behavior
    /// without allocating an enormous pool.
    #[must_use]
    pub fn with_capacity_hints(mut self, segment_capacity: usize, gap_capacity: usize) -> Self {
        self.initial_segment_capacity = segment_capacity;
        self.initial_gap_capacity = gap_capacity;
        self
    }

    /// Overrides the occupancy fraction above which internal arrays grow.
    #[must_use]
    pub fn with_fill_factor(mut self, fill_factor: f64) -> Self {
        self.fill_factor = fill_factor;
        self
    }
}

/// Configuration for the process-wide pool registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryConfig {
    /// Initial capacity of the registry's pool table.
    pub initial_capacity: usize,
}

impl RegistryConfig {
    /// A registry configuration using the default initial capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial_capacity: DEFAULT_REGISTRY_CAPACITY,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}
