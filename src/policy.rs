//! Placement policy for satisfying an allocation request.

/// How a pool selects which free segment satisfies an allocation.
///
/// Two variants do not justify dynamic dispatch: the policy is a plain tag
/// branched once per `allocate` call, keeping the selection loop monomorphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlacementPolicy {
    /// Selects the lowest-address free segment large enough for the request.
    FirstFit,
    /// Selects the smallest free segment large enough for the request,
    /// breaking ties by lowest address.
    BestFit,
}
