//! Process-wide directory of open pools.
//!
//! Pools are addressed from outside this crate by an opaque [`PoolHandle`]
//! rather than by reference, so the registry itself can live behind a single
//! process-wide lock without forcing every caller to share a lifetime.

use std::num::NonZeroU32;

use parking_lot::RwLock;

use crate::config::{PoolConfig, RegistryConfig};
use crate::error::{PoolError, RegistryError};
use crate::pool::{AllocationHandle, Pool, SegmentView};

/// Opaque, process-wide reference to an open pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    index: usize,
    generation: NonZeroU32,
}

struct Slot {
    pool: Option<Pool>,
    generation: NonZeroU32,
}

struct RegistryInner {
    slots: Vec<Slot>,
    free_slots: Vec<usize>,
    open_count: usize,
}

impl RegistryInner {
    fn new(config: RegistryConfig) -> Self {
        Self {
            slots: Vec::with_capacity(config.initial_capacity.max(1)),
            free_slots: Vec::new(),
            open_count: 0,
        }
    }

    fn open(&mut self, pool: Pool) -> Result<PoolHandle, PoolError> {
        if self.free_slots.is_empty() {
            let occupancy = self.slots.len() as f64 / self.slots.capacity().max(1) as f64;
            if occupancy > crate::config::DEFAULT_FILL_FACTOR {
                let additional = self.slots.capacity().max(1);
                if self.slots.try_reserve(additional).is_err() {
                    return Err(PoolError::OutOfMemory {
                        requested: pool.total_size(),
                    });
                }
            }
        }
        self.open_count += 1;
        let handle = if let Some(index) = self.free_slots.pop() {
            let generation = self.slots[index].generation;
            self.slots[index] = Slot {
                pool: Some(pool),
                generation,
            };
            PoolHandle { index, generation }
        } else {
            let generation = NonZeroU32::new(1).unwrap();
            self.slots.push(Slot {
                pool: Some(pool),
                generation,
            });
            PoolHandle {
                index: self.slots.len() - 1,
                generation,
            }
        };
        Ok(handle)
    }

    fn get(&self, handle: PoolHandle) -> Result<&Pool, RegistryError> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.pool.as_ref())
            .ok_or(RegistryError::BadHandle)
    }

    fn get_mut(&mut self, handle: PoolHandle) -> Result<&mut Pool, RegistryError> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.pool.as_mut())
            .ok_or(RegistryError::BadHandle)
    }

    fn close(&mut self, handle: PoolHandle) -> Result<(), RegistryError> {
        let slot = self
            .slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .ok_or(RegistryError::BadHandle)?;
        let pool = slot.pool.take().ok_or(RegistryError::BadHandle)?;
        match pool.close() {
            Ok(()) => {
                slot.generation = NonZeroU32::new(slot.generation.get().wrapping_add(1).max(1))
                    .unwrap_or(NonZeroU32::new(1).unwrap());
                self.free_slots.push(handle.index);
                self.open_count -= 1;
                Ok(())
            }
            Err(err) => {
                slot.pool = Some(err.pool);
                Err(RegistryError::Pool(err.source))
            }
        }
    }
}

/// Global registry state: `None` when uninitialized or torn down.
static REGISTRY: RwLock<Option<RegistryInner>> = RwLock::new(None);

/// Initializes the global registry. Fails if already initialized.
pub fn registry_init(config: RegistryConfig) -> Result<(), RegistryError> {
    let mut guard = REGISTRY.write();
    if guard.is_some() {
        return Err(RegistryError::AlreadyInitialized);
    }
    *guard = Some(RegistryInner::new(config));
    tracing::debug!("registry initialized");
    Ok(())
}

/// Tears down the global registry. Fails if any pool is still open.
pub fn registry_teardown() -> Result<(), RegistryError> {
    let mut guard = REGISTRY.write();
    let inner = guard.as_ref().ok_or(RegistryError::NotInitialized)?;
    if inner.open_count > 0 {
        return Err(RegistryError::PoolsLive {
            open_pools: inner.open_count,
        });
    }
    *guard = None;
    tracing::debug!("registry torn down");
    Ok(())
}

/// Opens a pool and registers it, returning a process-wide handle.
pub fn open(config: PoolConfig) -> Result<PoolHandle, RegistryError> {
    let pool = Pool::open(config)?;
    let mut guard = REGISTRY.write();
    let inner = guard.as_mut().ok_or(RegistryError::NotInitialized)?;
    Ok(inner.open(pool)?)
}

/// Closes a registered pool, unless it still has live allocations.
pub fn close(handle: PoolHandle) -> Result<(), RegistryError> {
    let mut guard = REGISTRY.write();
    let inner = guard.as_mut().ok_or(RegistryError::NotInitialized)?;
    inner.close(handle)
}

/// Allocates from a registered pool.
pub fn allocate(handle: PoolHandle, requested_size: usize) -> Result<AllocationHandle, RegistryError> {
    let mut guard = REGISTRY.write();
    let inner = guard.as_mut().ok_or(RegistryError::NotInitialized)?;
    Ok(inner.get_mut(handle)?.allocate(requested_size)?)
}

/// Frees an allocation in a registered pool.
pub fn free(handle: PoolHandle, alloc: AllocationHandle) -> Result<(), RegistryError> {
    let mut guard = REGISTRY.write();
    let inner = guard.as_mut().ok_or(RegistryError::NotInitialized)?;
    Ok(inner.get_mut(handle)?.free(alloc)?)
}

/// Reads an ordered segment report from a registered pool.
pub fn inspect(handle: PoolHandle) -> Result<Vec<SegmentView>, RegistryError> {
    let guard = REGISTRY.read();
    let inner = guard.as_ref().ok_or(RegistryError::NotInitialized)?;
    Ok(inner.get(handle)?.inspect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PlacementPolicy;
    use std::sync::Mutex;

    // The registry is process-wide global state; serialize tests against it.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn with_fresh_registry<F: FnOnce()>(f: F) {
        let _guard = TEST_LOCK.lock().unwrap();
        let _ = registry_teardown();
        registry_init(RegistryConfig::default()).unwrap();
        f();
        let _ = registry_teardown();
    }

    #[test]
    fn init_twice_fails() {
        with_fresh_registry(|| {
            assert_eq!(
                registry_init(RegistryConfig::default()),
                Err(RegistryError::AlreadyInitialized)
            );
        });
    }

    #[test]
    fn teardown_with_open_pool_fails() {
        with_fresh_registry(|| {
            let handle = open(PoolConfig::new(100, PlacementPolicy::FirstFit)).unwrap();
            assert_eq!(
                registry_teardown(),
                Err(RegistryError::PoolsLive { open_pools: 1 })
            );
            close(handle).unwrap();
        });
    }

    #[test]
    fn closed_handle_becomes_bad_handle() {
        with_fresh_registry(|| {
            let handle = open(PoolConfig::new(100, PlacementPolicy::FirstFit)).unwrap();
            close(handle).unwrap();
            assert_eq!(
                inspect(handle).unwrap_err(),
                RegistryError::BadHandle
            );
        });
    }

    #[test]
    fn allocate_and_free_through_registry() {
        with_fresh_registry(|| {
            let handle = open(PoolConfig::new(1000, PlacementPolicy::FirstFit)).unwrap();
            let alloc = allocate(handle, 100).unwrap();
            assert_eq!(alloc.base_pointer(), 0);
            free(handle, alloc).unwrap();
            close(handle).unwrap();
        });
    }
}
