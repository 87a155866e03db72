//! Taint: a join-semilattice collecting frames, partitioned by kind and call
//! attributes.

pub mod frame;
pub mod kind_frames;
pub mod tree;

pub use frame::{CallKind, CollapseDepth, ExtraTrace, Frame, PropagationTrace};
pub use kind_frames::{FrameKey, KindFrames};
pub use tree::TaintTree;

use sift_core::types::collections::{BTreeMap, FxHashMap};
use sift_core::types::{LiteralId, MethodId, TypeId};

use crate::access_path::PortRef;
use crate::domain::{AbstractDomain, TreeValue};
use crate::factories::Factories;
use crate::feature::{FeatureMayAlwaysSet, FeatureSet};
use crate::interval::ClassIntervalContext;
use crate::kind::Kind;
use crate::origin::Origin;
use crate::position::{LocalPositionSet, Position};

/// Call-site properties consumed by `Taint::propagate`.
pub struct PropagateContext<'a> {
    pub factories: &'a Factories,
    /// The resolved callee.
    pub callee: MethodId,
    /// The callee-side port the instantiated taint refers to.
    pub callee_port: PortRef,
    /// The position of the call.
    pub call_position: Position,
    /// Frames whose new distance exceeds this are dropped.
    pub max_source_sink_distance: u32,
    /// Features contributed by class properties and propagation settings;
    /// they become locally-inferred on the instantiated frames.
    pub extra_features: FeatureMayAlwaysSet,
    /// Argument index to register type, for via-type-of resolution.
    pub source_register_types: &'a FxHashMap<u8, TypeId>,
    /// Argument index to constant argument, for via-value-of and path
    /// indirection resolution.
    pub source_constant_arguments: &'a FxHashMap<u8, LiteralId>,
    /// The caller's interval context.
    pub caller_interval: ClassIntervalContext,
}

/// A collection of frames, organized kind first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taint {
    map: BTreeMap<Kind, KindFrames>,
}

impl Taint {
    /// A taint holding one frame.
    pub fn singleton(frame: Frame) -> Taint {
        let mut taint = Taint::bottom();
        taint.add(frame);
        taint
    }

    /// Build from an iterator of frames.
    pub fn from_frames(frames: impl IntoIterator<Item = Frame>) -> Taint {
        let mut taint = Taint::bottom();
        for frame in frames {
            taint.add(frame);
        }
        taint
    }

    /// Add a frame, joining with the bucket sharing its grouping key.
    pub fn add(&mut self, frame: Frame) {
        let kind = frame.kind().clone();
        let artificial = kind.is_artificial_source();
        self.map
            .entry(kind)
            .or_insert_with(KindFrames::new)
            .add(frame, artificial);
    }

    /// Iterate over all frames.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.map.values().flat_map(KindFrames::iter)
    }

    /// Number of frames.
    pub fn frame_count(&self) -> usize {
        self.map.values().map(KindFrames::len).sum()
    }

    /// The kinds present, in stable order.
    pub fn kinds(&self) -> impl Iterator<Item = &Kind> {
        self.map.keys()
    }

    /// Split into independent per-kind taints.
    pub fn partition_by_kind(&self) -> BTreeMap<Kind, Taint> {
        self.map
            .iter()
            .map(|(kind, frames)| {
                let mut taint = Taint::bottom();
                taint.map.insert(kind.clone(), frames.clone());
                (kind.clone(), taint)
            })
            .collect()
    }

    /// Split by an arbitrary kind projection. Kinds mapped to `None` are
    /// dropped.
    pub fn partition_by<T: Ord>(&self, project: impl Fn(&Kind) -> Option<T>) -> BTreeMap<T, Taint> {
        let mut result: BTreeMap<T, Taint> = BTreeMap::new();
        for (kind, frames) in &self.map {
            if let Some(key) = project(kind) {
                let entry = result.entry(key).or_insert_with(Taint::bottom);
                entry.map.insert(kind.clone(), frames.clone());
            }
        }
        result
    }

    /// Keep only kinds satisfying the predicate.
    pub fn filter_kinds(&mut self, keep: impl Fn(&Kind) -> bool) {
        self.map.retain(|kind, _| keep(kind));
    }

    /// Apply a mutation to every frame. Must not change grouping keys.
    pub fn map_frames(&mut self, f: impl Fn(&mut Frame)) {
        for frames in self.map.values_mut() {
            for frame in frames.iter_mut() {
                f(frame);
            }
        }
    }

    /// Keep only frames satisfying the predicate.
    pub fn retain_frames(&mut self, keep: impl Fn(&Frame) -> bool) {
        for frames in self.map.values_mut() {
            frames.retain(|frame| keep(frame));
        }
        self.map.retain(|_, frames| !frames.is_empty());
    }

    /// Rebuild the storage after key-changing frame mutations.
    fn rebuild(frames: impl IntoIterator<Item = Frame>) -> Taint {
        Taint::from_frames(frames)
    }

    /// Add locally-inferred features to every frame.
    pub fn add_locally_inferred_features(&mut self, features: &FeatureMayAlwaysSet) {
        if features.is_empty() {
            return;
        }
        self.map_frames(|frame| frame.add_locally_inferred_features(features));
    }

    /// Add a set of features as always locally-inferred.
    pub fn add_locally_inferred_always_features(&mut self, features: &FeatureSet) {
        if features.is_empty() {
            return;
        }
        let features = FeatureMayAlwaysSet::from_always(features.clone());
        self.add_locally_inferred_features(&features);
    }

    /// Record a local position on every frame, widening past the cap.
    pub fn add_local_position(&mut self, position: &Position, max_positions: usize) {
        let position = position.clone();
        for frames in self.map.values_mut() {
            for frame in frames.iter_mut() {
                frame.add_local_position(position.clone(), max_positions);
            }
        }
    }

    /// Join of all frames' local positions.
    pub fn local_positions(&self) -> LocalPositionSet {
        let mut result = LocalPositionSet::Bottom;
        for frame in self.frames() {
            result.join_with(frame.local_positions());
        }
        result
    }

    /// Join of all frames' features; bottom when there are no frames.
    pub fn features_joined(&self) -> FeatureMayAlwaysSet {
        let mut result: Option<FeatureMayAlwaysSet> = None;
        for frame in self.frames() {
            let features = frame.features_joined();
            match &mut result {
                None => result = Some(features),
                Some(joined) => joined.join_with(&features),
            }
        }
        result.unwrap_or_default()
    }

    /// Convert declaration frames into origin frames rooted at the given
    /// origin, leaving other frames untouched.
    pub fn add_origins_if_declaration(&mut self, origin: &Origin) -> &mut Taint {
        let needs_rebuild = self
            .frames()
            .any(|frame| frame.call_kind().is_declaration());
        if !needs_rebuild {
            return self;
        }
        let frames: Vec<Frame> = self
            .map
            .values()
            .flat_map(KindFrames::iter)
            .cloned()
            .map(|mut frame| {
                if frame.call_kind().is_declaration() {
                    frame.set_call_kind(CallKind::Origin);
                    frame.add_origin(origin.clone());
                }
                frame
            })
            .collect();
        *self = Taint::rebuild(frames);
        self
    }

    /// Instantiate declared parameter sources at method entry: declaration
    /// frames become origin frames rooted at the parameter port, and every
    /// frame is positioned at the method entry.
    pub fn as_parameter_origins(&self, origin: &Origin, entry_position: &Position) -> Taint {
        let frames: Vec<Frame> = self
            .frames()
            .cloned()
            .map(|mut frame| {
                if frame.call_kind().is_declaration() {
                    frame.set_call_kind(CallKind::Origin);
                    frame.add_origin(origin.clone());
                }
                frame.set_call_position(entry_position.clone());
                frame
            })
            .collect();
        Taint::rebuild(frames)
    }

    /// Rewrite every frame's call position, keeping frames as leaf frames.
    pub fn attach_position(&self, position: &Position, leaf_port: &PortRef) -> Taint {
        let frames: Vec<Frame> = self
            .frames()
            .cloned()
            .map(|mut frame| {
                frame.set_call_position(position.clone());
                frame.set_callee_port(leaf_port.clone());
                frame.set_callee(None);
                if frame.call_kind().is_declaration() {
                    frame.set_call_kind(CallKind::Origin);
                }
                frame.clear_local_positions();
                frame
            })
            .collect();
        Taint::rebuild(frames)
    }

    /// Instantiate this taint at a call site. Frames beyond the distance cap
    /// or with empty interval intersections are dropped; bottom results mean
    /// the call site contributes nothing.
    pub fn propagate(&self, context: &PropagateContext<'_>) -> Taint {
        let mut result = Taint::bottom();
        for frame in self.frames() {
            if let Some(propagated) = frame.propagate(context) {
                result.add(propagated);
            }
        }
        result
    }

    /// Re-kind every frame through `kind_map`; frames mapped to no kinds are
    /// dropped, and `features_for` contributes locally-inferred features per
    /// replacement kind. User features carry onto every replacement.
    pub fn transform_kind_with_features(
        &self,
        kind_map: impl Fn(&Kind) -> Vec<Kind>,
        features_for: impl Fn(&Kind) -> FeatureSet,
    ) -> Taint {
        let mut result = Taint::bottom();
        for (kind, frames) in &self.map {
            let new_kinds = kind_map(kind);
            for new_kind in new_kinds {
                let features = features_for(&new_kind);
                for frame in frames.iter() {
                    let mut new_frame = frame.clone();
                    new_frame.set_kind(new_kind.clone());
                    if !features.is_empty() {
                        new_frame.add_locally_inferred_features(&FeatureMayAlwaysSet::from_always(
                            features.clone(),
                        ));
                    }
                    result.add(new_frame);
                }
            }
        }
        result
    }

    /// Drop frames of `self` whose interval does not intersect any same-kind
    /// frame of `other`. Frames that do not preserve type context are kept
    /// unconditionally.
    pub fn intersect_intervals_with(&mut self, other: &Taint) {
        for (kind, frames) in self.map.iter_mut() {
            let other_intervals: Vec<ClassIntervalContext> = other
                .map
                .get(kind)
                .map(|other_frames| other_frames.iter().map(|frame| *frame.interval()).collect())
                .unwrap_or_default();
            frames.retain(|frame| {
                if !frame.interval().preserves_type_context {
                    return true;
                }
                other_intervals.iter().any(|other_interval| {
                    !other_interval.preserves_type_context
                        || frame.interval().interval.intersects(&other_interval.interval)
                })
            });
        }
        self.map.retain(|_, frames| !frames.is_empty());
    }
}

impl AbstractDomain for Taint {
    fn bottom() -> Self {
        Self::default()
    }

    fn is_bottom(&self) -> bool {
        self.map.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        self.map.iter().all(|(kind, frames)| {
            other
                .map
                .get(kind)
                .map(|other_frames| frames.leq(other_frames, kind.is_artificial_source()))
                .unwrap_or(false)
        })
    }

    fn join_with(&mut self, other: &Self) {
        for (kind, other_frames) in &other.map {
            match self.map.get_mut(kind) {
                Some(frames) => frames.join_with(other_frames, kind.is_artificial_source()),
                None => {
                    self.map.insert(kind.clone(), other_frames.clone());
                }
            }
        }
    }
}

impl TreeValue for Taint {
    fn difference_with(&mut self, other: &Self) {
        for (kind, frames) in self.map.iter_mut() {
            if let Some(other_frames) = other.map.get(kind) {
                frames.difference_with(other_frames, kind.is_artificial_source());
            }
        }
        self.map.retain(|_, frames| !frames.is_empty());
    }
}
