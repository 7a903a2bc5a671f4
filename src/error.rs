//! The closed error taxonomy for pool and registry operations.

use thiserror::Error;

/// Everything that can go wrong operating on a single pool.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// An internal array (segment arena or gap index) could not grow.
    #[error("out of memory: could not grow internal storage for a {requested}-byte allocation")]
    OutOfMemory {
        /// Size of the allocation request that triggered the failed growth.
        requested: usize,
    },

    /// No free segment is large enough to satisfy the request.
    #[error("no free segment of at least {requested} bytes")]
    NoFit {
        /// Size of the allocation request that could not be satisfied.
        requested: usize,
    },

    /// The allocation handle does not resolve to a live allocated segment of this pool.
    #[error("handle does not refer to a live allocation in this pool")]
    BadHandle,

    /// `close` was attempted on a pool with outstanding allocations or more than one gap.
    #[error("pool is not empty: {num_allocs} live allocation(s), {num_gaps} gap(s)")]
    NotEmpty {
        /// Live allocations at the time `close` was attempted.
        num_allocs: usize,
        /// Free segments at the time `close` was attempted.
        num_gaps: usize,
    },
}

/// Everything that can go wrong operating on the process-wide pool registry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// `registry_init` was called while the registry was already initialized.
    #[error("registry is already initialized")]
    AlreadyInitialized,

    /// An operation other than `registry_init` was attempted before initialization.
    #[error("registry has not been initialized")]
    NotInitialized,

    /// `registry_teardown` was attempted while pools remain open.
    #[error("teardown attempted with {open_pools} pool(s) still open")]
    PoolsLive {
        /// Number of pools still registered at the time teardown was attempted.
        open_pools: usize,
    },

    /// The pool handle does not resolve to an open pool.
    #[error("handle does not refer to an open pool")]
    BadHandle,

    /// A per-pool operation failed; the registry forwards the pool's own error.
    #[error(transparent)]
    Pool(#[from] PoolError),
}
