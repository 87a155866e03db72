//! Taint trees: path-structured taint per memory location or model port.

use sift_core::types::FeatureId;

use crate::feature::FeatureSet;
use crate::tree::{AccessPathTree, PathTree};

use super::frame::CollapseDepth;
use super::Taint;

/// Per-memory-location, path-structured taint.
pub type TaintTree = PathTree<Taint>;

/// Root-indexed family of taint trees, used by models.
pub type TaintAccessPathTree = AccessPathTree<Taint>;

/// A tree transform that records precision loss by attaching a broadening
/// feature as an always locally-inferred feature. Idempotent, as required by
/// the collapse operations.
pub fn broadening(feature: FeatureId) -> impl Fn(&mut Taint) + Copy {
    move |taint: &mut Taint| {
        taint.add_locally_inferred_always_features(&FeatureSet::singleton(feature));
    }
}

/// Join a whole taint tree into one taint, tagging collapsed values.
pub fn collapse_tree(tree: &TaintTree, feature: FeatureId) -> Taint {
    tree.collapse(broadening(feature))
}

/// Apply a propagation leaf's collapse depth to an input tree.
///
/// `Collapse(0)` folds the whole tree into its root; `Collapse(k)` keeps `k`
/// levels of structure; `NoCollapse` leaves the tree untouched.
pub fn apply_collapse_depth(tree: &mut TaintTree, depth: CollapseDepth, feature: FeatureId) {
    match depth {
        CollapseDepth::Bottom | CollapseDepth::NoCollapse => {}
        CollapseDepth::Collapse(depth) => {
            tree.collapse_deeper_than(depth as usize, broadening(feature));
        }
    }
}
