//! Property-based tests for the lattice laws of the taint domain.
//!
//! Fuzz-verifies, over randomly built values:
//!   - join is commutative, associative, idempotent, with bottom as identity
//!   - leq is reflexive and transitive, and join is an upper bound
//!   - path-tree read/write laws, including the prefix law
//!   - may/always feature algebra

use proptest::prelude::*;

use sift_analysis::access_path::{Path, PathElement};
use sift_analysis::domain::{AbstractDomain, TreeValue};
use sift_analysis::factories::Factories;
use sift_analysis::feature::{FeatureMayAlwaysSet, FeatureSet};
use sift_analysis::taint::{CallKind, CollapseDepth, Frame, Taint};
use sift_analysis::tree::{PathTree, UpdateKind};
use sift_core::types::interning::SymbolInterner;
use sift_core::types::FieldId;

/// A small set-of-integers domain, as bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Bits(u64);

impl AbstractDomain for Bits {
    fn bottom() -> Self {
        Bits(0)
    }

    fn is_bottom(&self) -> bool {
        self.0 == 0
    }

    fn leq(&self, other: &Self) -> bool {
        self.0 & !other.0 == 0
    }

    fn join_with(&mut self, other: &Self) {
        self.0 |= other.0;
    }
}

impl TreeValue for Bits {
    fn difference_with(&mut self, other: &Self) {
        self.0 &= !other.0;
    }
}

/// One write operation: a short path over a four-element alphabet, a value,
/// and an update kind.
#[derive(Debug, Clone)]
struct Write {
    path: Vec<u8>,
    value: u64,
    strong: bool,
}

fn write_strategy() -> impl Strategy<Value = Write> {
    (
        prop::collection::vec(0u8..4, 0..4),
        1u64..256,
        any::<bool>(),
    )
        .prop_map(|(path, value, strong)| Write { path, value, strong })
}

fn writes_strategy() -> impl Strategy<Value = Vec<Write>> {
    prop::collection::vec(write_strategy(), 0..12)
}

fn element(fields: &SymbolInterner, id: u8) -> PathElement {
    match id {
        3 => PathElement::AnyIndex,
        _ => PathElement::Field(FieldId::new(fields.intern(&format!("f{}", id)))),
    }
}

fn build_tree(fields: &SymbolInterner, writes: &[Write]) -> PathTree<Bits> {
    let mut tree = PathTree::bottom();
    for write in writes {
        let path: Path = write.path.iter().map(|id| element(fields, *id)).collect();
        let kind = if write.strong {
            UpdateKind::Strong
        } else {
            UpdateKind::Weak
        };
        tree.write_value(&path, Bits(write.value), kind);
    }
    tree
}

fn equivalent<V: AbstractDomain>(left: &V, right: &V) -> bool {
    left.leq(right) && right.leq(left)
}

proptest! {
    #[test]
    fn prop_tree_join_commutative(a in writes_strategy(), b in writes_strategy()) {
        let fields = SymbolInterner::new();
        let left = build_tree(&fields, &a);
        let right = build_tree(&fields, &b);

        let mut ab = left.clone();
        ab.join_with(&right);
        let mut ba = right.clone();
        ba.join_with(&left);

        prop_assert!(equivalent(&ab, &ba));
    }

    #[test]
    fn prop_tree_join_associative(
        a in writes_strategy(),
        b in writes_strategy(),
        c in writes_strategy(),
    ) {
        let fields = SymbolInterner::new();
        let ta = build_tree(&fields, &a);
        let tb = build_tree(&fields, &b);
        let tc = build_tree(&fields, &c);

        let mut left = ta.clone();
        left.join_with(&tb);
        left.join_with(&tc);

        let mut bc = tb.clone();
        bc.join_with(&tc);
        let mut right = ta.clone();
        right.join_with(&bc);

        prop_assert!(equivalent(&left, &right));
    }

    #[test]
    fn prop_tree_join_idempotent(a in writes_strategy()) {
        let fields = SymbolInterner::new();
        let tree = build_tree(&fields, &a);
        let mut twice = tree.clone();
        twice.join_with(&tree);
        prop_assert!(equivalent(&twice, &tree));
    }

    #[test]
    fn prop_tree_bottom_is_identity(a in writes_strategy()) {
        let fields = SymbolInterner::new();
        let tree = build_tree(&fields, &a);
        let mut joined = tree.clone();
        joined.join_with(&PathTree::bottom());
        prop_assert!(equivalent(&joined, &tree));
        prop_assert!(PathTree::<Bits>::bottom().leq(&tree));
    }

    #[test]
    fn prop_tree_join_is_upper_bound(a in writes_strategy(), b in writes_strategy()) {
        let fields = SymbolInterner::new();
        let left = build_tree(&fields, &a);
        let right = build_tree(&fields, &b);
        let mut joined = left.clone();
        joined.join_with(&right);

        prop_assert!(left.leq(&joined));
        prop_assert!(right.leq(&joined));
    }

    #[test]
    fn prop_tree_leq_reflexive(a in writes_strategy()) {
        let fields = SymbolInterner::new();
        let tree = build_tree(&fields, &a);
        prop_assert!(tree.leq(&tree));
    }

    #[test]
    fn prop_tree_leq_transitive_along_join_chain(
        a in writes_strategy(),
        b in writes_strategy(),
        c in writes_strategy(),
    ) {
        let fields = SymbolInterner::new();
        let first = build_tree(&fields, &a);
        let mut second = first.clone();
        second.join_with(&build_tree(&fields, &b));
        let mut third = second.clone();
        third.join_with(&build_tree(&fields, &c));

        prop_assert!(first.leq(&second));
        prop_assert!(second.leq(&third));
        prop_assert!(first.leq(&third));
    }

    #[test]
    fn prop_tree_read_prefix_law(a in writes_strategy(), path in prop::collection::vec(0u8..4, 0..4)) {
        let fields = SymbolInterner::new();
        let tree = build_tree(&fields, &a);

        let full: Path = path.iter().map(|id| element(&fields, *id)).collect();
        for cut in 0..path.len() {
            let prefix: Path = path[..cut].iter().map(|id| element(&fields, *id)).collect();
            // Everything reachable from a deeper read is covered by the
            // prefix read.
            let deep = tree.read(&full).collapse(|_| {});
            let shallow = tree.read(&prefix).collapse(|_| {});
            prop_assert!(deep.leq(&shallow));
        }
    }

    #[test]
    fn prop_tree_strong_write_clears_descendants(
        a in writes_strategy(),
        path in prop::collection::vec(0u8..3, 1..4),
        value in 1u64..256,
    ) {
        let fields = SymbolInterner::new();
        let mut tree = build_tree(&fields, &a);
        let target: Path = path.iter().map(|id| element(&fields, *id)).collect();

        tree.write_value(&target, Bits(value), UpdateKind::Strong);
        // A strong write deletes everything below the written node.
        prop_assert!(tree.raw_read(&target).successors().next().is_none());
    }

    #[test]
    fn prop_tree_subsumption_invariant(a in writes_strategy()) {
        let fields = SymbolInterner::new();
        let tree = build_tree(&fields, &a);

        // No node holds bits already present on its ancestor chain.
        fn check(node: &PathTree<Bits>, accumulator: Bits) -> bool {
            if node.value().0 & accumulator.0 != 0 {
                return false;
            }
            let mut child_accumulator = accumulator;
            child_accumulator.join_with(node.value());
            node.successors()
                .all(|(_, child)| check(child, child_accumulator))
        }
        prop_assert!(check(&tree, Bits(0)));
    }

    #[test]
    fn prop_feature_may_always_join_laws(
        may_a in prop::collection::btree_set(0u8..8, 0..4),
        always_a in prop::collection::btree_set(0u8..8, 0..4),
        may_b in prop::collection::btree_set(0u8..8, 0..4),
        always_b in prop::collection::btree_set(0u8..8, 0..4),
    ) {
        let factories = Factories::new();
        let set = |ids: &std::collections::BTreeSet<u8>| -> FeatureSet {
            ids.iter().map(|id| factories.features.get(&format!("f{}", id))).collect()
        };
        let a = FeatureMayAlwaysSet::from_sets(set(&may_a), set(&always_a));
        let b = FeatureMayAlwaysSet::from_sets(set(&may_b), set(&always_b));

        let mut ab = a.clone();
        ab.join_with(&b);
        let mut ba = b.clone();
        ba.join_with(&a);
        prop_assert_eq!(&ab, &ba);

        // Upper bound, and the always-set can only shrink.
        prop_assert!(a.leq(&ab));
        prop_assert!(b.leq(&ab));
        prop_assert!(ab.always().is_subset_of(a.always()));
        // Invariant: always is contained in may.
        prop_assert!(ab.always().is_subset_of(ab.may()));
    }

    #[test]
    fn prop_taint_join_laws(
        frames_a in prop::collection::vec((0u8..3, 0u8..3, 0u32..4), 0..6),
        frames_b in prop::collection::vec((0u8..3, 0u8..3, 0u32..4), 0..6),
    ) {
        let factories = Factories::new();
        let build = |spec: &[(u8, u8, u32)]| -> Taint {
            let mut taint = Taint::bottom();
            for (kind, port, distance) in spec {
                let kind = factories.kinds.named(&format!("Kind{}", kind));
                let port = factories.access_paths.argument(*port);
                let frame = if *distance == 0 {
                    Frame::with_call_kind(kind, port, CallKind::Origin)
                } else {
                    Frame::with_call_kind(kind, port, CallKind::CallSite)
                        .with_callee(factories.method("LCallee;.run:()V"))
                        .with_distance(*distance)
                };
                taint.add(frame);
            }
            taint
        };
        let a = build(&frames_a);
        let b = build(&frames_b);

        let mut ab = a.clone();
        ab.join_with(&b);
        let mut ba = b.clone();
        ba.join_with(&a);
        prop_assert!(equivalent(&ab, &ba));

        prop_assert!(a.leq(&ab));
        prop_assert!(b.leq(&ab));
        prop_assert!(Taint::bottom().leq(&a));

        let mut idem = a.clone();
        idem.join_with(&a);
        prop_assert!(equivalent(&idem, &a));
    }

    #[test]
    fn prop_collapse_depth_join_takes_minimum(a in 0u32..10, b in 0u32..10) {
        let mut left = CollapseDepth::Collapse(a);
        left.join_with(&CollapseDepth::Collapse(b));
        prop_assert_eq!(left, CollapseDepth::Collapse(a.min(b)));

        // NoCollapse is the identity among non-bottom depths.
        let mut no_collapse = CollapseDepth::NoCollapse;
        no_collapse.join_with(&CollapseDepth::Collapse(a));
        prop_assert_eq!(no_collapse, CollapseDepth::Collapse(a));

        let mut bottom = CollapseDepth::Bottom;
        bottom.join_with(&CollapseDepth::NoCollapse);
        prop_assert_eq!(bottom, CollapseDepth::NoCollapse);
    }
}
