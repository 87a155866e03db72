//! Features: user-visible breadcrumbs attached to taint.
//!
//! A feature is an interned name. `FeatureSet` is a plain set;
//! `FeatureMayAlwaysSet` is the two-valued lattice distinguishing features
//! that are possibly present (`may`) from features present on every path
//! (`always`). Broadening features from `sift_core::constants` mark precision
//! loss in the abstract domain.

use sift_core::constants;
use sift_core::types::collections::BTreeSet;
use sift_core::types::interning::SymbolInterner;
use sift_core::types::FeatureId;

use crate::domain::AbstractDomain;

/// Interning factory for feature names.
pub struct FeatureFactory {
    symbols: SymbolInterner,
}

impl FeatureFactory {
    pub fn new() -> Self {
        Self {
            symbols: SymbolInterner::new(),
        }
    }

    /// Intern a feature name.
    pub fn get(&self, name: &str) -> FeatureId {
        FeatureId::new(self.symbols.intern(name))
    }

    /// Resolve a feature back to its name.
    pub fn resolve(&self, feature: &FeatureId) -> &str {
        self.symbols.resolve(&feature.inner())
    }

    /// The `via-cast:<type>` feature.
    pub fn get_via_cast(&self, type_name: &str) -> FeatureId {
        self.get(&format!("{}{}", constants::FEATURE_VIA_CAST_PREFIX, type_name))
    }

    /// The `via-type:<type>` feature for a resolved via-type-of port.
    pub fn get_via_type_of(&self, type_name: &str) -> FeatureId {
        self.get(&format!("{}{}", constants::FEATURE_VIA_TYPE_PREFIX, type_name))
    }

    /// The `via-value:<literal>` feature for a resolved via-value-of port.
    pub fn get_via_value_of(&self, value: &str) -> FeatureId {
        self.get(&format!("{}{}", constants::FEATURE_VIA_VALUE_PREFIX, value))
    }

    pub fn get_widen_broadening(&self) -> FeatureId {
        self.get(constants::FEATURE_WIDEN_BROADENING)
    }

    pub fn get_issue_broadening(&self) -> FeatureId {
        self.get(constants::FEATURE_ISSUE_BROADENING)
    }

    pub fn get_propagation_broadening(&self) -> FeatureId {
        self.get(constants::FEATURE_PROPAGATION_BROADENING)
    }

    pub fn get_via_obscure(&self) -> FeatureId {
        self.get(constants::FEATURE_VIA_OBSCURE)
    }

    pub fn get_via_array(&self) -> FeatureId {
        self.get(constants::FEATURE_VIA_ARRAY)
    }

    pub fn get_via_numerical_operator(&self) -> FeatureId {
        self.get(constants::FEATURE_VIA_NUMERICAL_OPERATOR)
    }
}

impl Default for FeatureFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of features.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeatureSet {
    set: BTreeSet<FeatureId>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(feature: FeatureId) -> Self {
        let mut set = BTreeSet::new();
        set.insert(feature);
        Self { set }
    }

    pub fn add(&mut self, feature: FeatureId) {
        self.set.insert(feature);
    }

    pub fn contains(&self, feature: &FeatureId) -> bool {
        self.set.contains(feature)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureId> {
        self.set.iter()
    }

    /// Set union.
    pub fn union_with(&mut self, other: &FeatureSet) {
        self.set.extend(other.set.iter().copied());
    }

    /// Set intersection.
    pub fn intersect_with(&mut self, other: &FeatureSet) {
        self.set.retain(|feature| other.set.contains(feature));
    }

    /// Set difference.
    pub fn difference_with(&mut self, other: &FeatureSet) {
        self.set.retain(|feature| !other.set.contains(feature));
    }

    pub fn is_subset_of(&self, other: &FeatureSet) -> bool {
        self.set.is_subset(&other.set)
    }
}

impl FromIterator<FeatureId> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = FeatureId>>(iter: I) -> Self {
        Self {
            set: iter.into_iter().collect(),
        }
    }
}

impl AbstractDomain for FeatureSet {
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        self.is_subset_of(other)
    }

    fn join_with(&mut self, other: &Self) {
        self.union_with(other);
    }
}

/// The may/always feature lattice.
///
/// Invariant: `always ⊆ may`. Joining branches unions `may` and intersects
/// `always`; a feature stays `always` only if every path carries it.
///
/// The empty value is not a join identity for `always` (joining with it
/// demotes every `always` feature to `may`); folds over collections of
/// feature sets go through `Option` and clone the first element.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeatureMayAlwaysSet {
    may: FeatureSet,
    always: FeatureSet,
}

impl FeatureMayAlwaysSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit may/always sets. Always-features are added to the
    /// may-set to maintain the invariant.
    pub fn from_sets(may: FeatureSet, always: FeatureSet) -> Self {
        let mut may = may;
        may.union_with(&always);
        Self { may, always }
    }

    /// A set where every feature is always present.
    pub fn from_always(always: FeatureSet) -> Self {
        Self {
            may: always.clone(),
            always,
        }
    }

    /// Features possibly present (includes always-features).
    pub fn may(&self) -> &FeatureSet {
        &self.may
    }

    /// Features present on every path.
    pub fn always(&self) -> &FeatureSet {
        &self.always
    }

    pub fn is_empty(&self) -> bool {
        self.may.is_empty()
    }

    /// Add a feature as always present.
    pub fn add_always(&mut self, feature: FeatureId) {
        self.may.add(feature);
        self.always.add(feature);
    }

    /// Add a feature as possibly present.
    pub fn add_may(&mut self, feature: FeatureId) {
        self.may.add(feature);
    }

    /// Add a whole set as always present.
    pub fn add_always_set(&mut self, features: &FeatureSet) {
        self.may.union_with(features);
        self.always.union_with(features);
    }

    /// Pairwise union with another may/always set. Unlike `join_with`, this
    /// keeps both sides' always-features: it accumulates facts about one
    /// path instead of merging alternative paths.
    pub fn add_set(&mut self, other: &FeatureMayAlwaysSet) {
        self.may.union_with(&other.may);
        self.always.union_with(&other.always);
    }
}

impl AbstractDomain for FeatureMayAlwaysSet {
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        self.may.is_subset_of(&other.may) && other.always.is_subset_of(&self.always)
    }

    fn join_with(&mut self, other: &Self) {
        self.may.union_with(&other.may);
        self.always.intersect_with(&other.always);
    }
}
