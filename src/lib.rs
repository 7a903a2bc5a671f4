//! # poolkeeper
//!
//! A user-space memory pool allocator. Callers open fixed-size pools and
//! request/release variable-sized allocations within them; each pool
//! maintains an address-ordered segment list and a size-sorted gap index so
//! that both first-fit and best-fit placement stay cheap under churn.
//!
//! Use [`Pool`] directly when you own the pool for the lifetime of your
//! program or data structure. Use the [`registry`] module when pools need to
//! be addressed by an opaque, process-wide handle instead of by reference.

pub mod config;
pub mod error;
pub mod gap_index;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod segment;
pub mod utils;

pub use config::{PoolConfig, RegistryConfig};
pub use error::{PoolError, RegistryError};
pub use policy::PlacementPolicy;
pub use pool::{AllocationHandle, ClosePoolError, Pool, SegmentView};
pub use registry::PoolHandle;
