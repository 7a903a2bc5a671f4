//! Property-based checks of the pool invariants under random operation
//! sequences, plus the round-trip/idempotence laws.

use poolkeeper::policy::PlacementPolicy;
use poolkeeper::pool::{AllocationHandle, Pool};
use poolkeeper::{PoolConfig, PoolError};
use proptest::prelude::*;

const TOTAL_SIZE: usize = 4096;

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    Free(usize), // index into the list of still-live handles, mod len
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1..=512usize).prop_map(Op::Allocate),
        (0..256usize).prop_map(Op::Free),
    ]
}

/// Checks invariants 1-5: coverage/ordering, no-adjacent-free, gap-index
/// bijection and order, counter agreement, and the sum identity.
fn check_invariants(pool: &Pool) {
    let segments = pool.inspect();

    let total: usize = segments.iter().map(|s| s.size).sum();
    assert_eq!(total, pool.total_size(), "coverage: segments must tile the pool");

    for window in segments.windows(2) {
        assert!(
            window[0].allocated || window[1].allocated,
            "no two consecutive segments may both be free"
        );
    }

    let counted_allocs = segments.iter().filter(|s| s.allocated).count();
    let counted_alloc_size: usize = segments
        .iter()
        .filter(|s| s.allocated)
        .map(|s| s.size)
        .sum();
    let counted_gaps = segments.iter().filter(|s| !s.allocated).count();

    assert_eq!(counted_allocs, pool.num_allocs());
    assert_eq!(counted_alloc_size, pool.alloc_size());
    assert_eq!(counted_gaps, pool.num_gaps());

    let free_total: usize = segments
        .iter()
        .filter(|s| !s.allocated)
        .map(|s| s.size)
        .sum();
    assert_eq!(pool.alloc_size() + free_total, pool.total_size());
}

proptest! {
    #[test]
    fn invariants_hold_under_random_traffic(
        policy in prop_oneof![Just(PlacementPolicy::FirstFit), Just(PlacementPolicy::BestFit)],
        ops in prop::collection::vec(op_strategy(), 0..200),
    ) {
        let mut pool = Pool::open(
            PoolConfig::new(TOTAL_SIZE, policy).with_capacity_hints(8, 8),
        )
        .unwrap();
        let mut live: Vec<AllocationHandle> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate(size) => {
                    match pool.allocate(size) {
                        Ok(handle) => live.push(handle),
                        Err(PoolError::NoFit { .. }) => {}
                        Err(PoolError::OutOfMemory { .. }) => {}
                        Err(other) => panic!("unexpected allocate error: {other:?}"),
                    }
                }
                Op::Free(raw_index) => {
                    if live.is_empty() {
                        continue;
                    }
                    let index = raw_index % live.len();
                    let handle = live.swap_remove(index);
                    pool.free(handle).unwrap();
                }
            }
            check_invariants(&pool);
        }
    }
}

#[test]
fn law_allocate_then_free_restores_partition() {
    let mut pool = Pool::open(PoolConfig::new(1000, PlacementPolicy::FirstFit)).unwrap();
    let before = pool.inspect();

    let handle = pool.allocate(128).unwrap();
    pool.free(handle).unwrap();

    let after = pool.inspect();
    assert_eq!(before, after);
}

#[test]
fn law_double_free_is_bad_handle_and_noop() {
    let mut pool = Pool::open(PoolConfig::new(1000, PlacementPolicy::FirstFit)).unwrap();
    let handle = pool.allocate(100).unwrap();
    pool.free(handle).unwrap();

    let before = pool.inspect();
    assert_eq!(pool.free(handle), Err(PoolError::BadHandle));
    assert_eq!(pool.inspect(), before);
}

#[test]
fn law_first_fit_pristine_allocation_starts_at_zero() {
    let mut pool = Pool::open(PoolConfig::new(1000, PlacementPolicy::FirstFit)).unwrap();
    let handle = pool.allocate(1000).unwrap();
    assert_eq!(handle.base_pointer(), 0);
}
