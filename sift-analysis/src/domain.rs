//! Join-semilattice traits shared by the taint abstract domain.

/// A join-semilattice with a bottom element.
///
/// `leq` is the partial order, `join_with` the least upper bound. Every
/// implementation must keep `join` commutative, associative, and idempotent,
/// with `bottom` as the identity; the property tests exercise these laws.
pub trait AbstractDomain: Sized + Clone {
    /// The least element.
    fn bottom() -> Self;

    /// Whether this is the least element.
    fn is_bottom(&self) -> bool;

    /// Partial order.
    fn leq(&self, other: &Self) -> bool;

    /// In-place least upper bound.
    fn join_with(&mut self, other: &Self);

    /// Owned least upper bound.
    fn join(mut self, other: &Self) -> Self {
        self.join_with(other);
        self
    }

    /// In-place widening. Defaults to join; height-bounded structures
    /// override this to collapse.
    fn widen_with(&mut self, other: &Self) {
        self.join_with(other);
    }
}

/// Values storable in a [`crate::tree::PathTree`].
///
/// Trees keep each node's value disjoint from its ancestors (subsumption), so
/// the value domain must support subtraction of already-covered parts.
pub trait TreeValue: AbstractDomain {
    /// Remove the parts of `self` that are already covered by `other`.
    /// After the call, `self.join(other)` equals the original `self.join(other)`,
    /// but `self` holds nothing that `other` subsumes.
    fn difference_with(&mut self, other: &Self);
}
