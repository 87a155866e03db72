//! A frame: one immutable unit of taint at one call site with one kind.

use sift_core::constants;
use sift_core::types::collections::BTreeSet;
use sift_core::types::MethodId;

use crate::access_path::{PortRef, Root};
use crate::domain::{AbstractDomain, TreeValue};
use crate::feature::{FeatureMayAlwaysSet, FeatureSet};
use crate::interval::ClassIntervalContext;
use crate::kind::Kind;
use crate::origin::{CanonicalName, OriginSet};
use crate::position::{LocalPositionSet, Position};
use crate::tree::PathTree;

use super::PropagateContext;

/// How a frame came to be at its position in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CallKind {
    /// Written in a model, not yet attached to any program point.
    Declaration,
    /// The leaf of a trace: the declaring method/field itself.
    Origin,
    /// One hop along a trace, at a call site.
    CallSite,
    /// A propagation written in a model.
    Propagation,
    /// A propagation that acquired a trace hop.
    PropagationWithTrace(PropagationTrace),
}

/// The trace state of a propagated propagation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropagationTrace {
    Origin,
    CallSite,
}

impl CallKind {
    /// The call kind after one call-site hop. Declarations become origins,
    /// origins become call sites, call sites stay call sites; propagation
    /// variants follow the parallel lattice.
    pub fn propagate(self) -> CallKind {
        match self {
            CallKind::Declaration => CallKind::Origin,
            CallKind::Origin => CallKind::CallSite,
            CallKind::CallSite => CallKind::CallSite,
            CallKind::Propagation => CallKind::PropagationWithTrace(PropagationTrace::Origin),
            CallKind::PropagationWithTrace(PropagationTrace::Origin) => {
                CallKind::PropagationWithTrace(PropagationTrace::CallSite)
            }
            CallKind::PropagationWithTrace(PropagationTrace::CallSite) => {
                CallKind::PropagationWithTrace(PropagationTrace::CallSite)
            }
        }
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self, CallKind::Declaration)
    }

    pub fn is_origin(&self) -> bool {
        matches!(self, CallKind::Origin)
    }

    pub fn is_call_site(&self) -> bool {
        matches!(
            self,
            CallKind::CallSite | CallKind::PropagationWithTrace(PropagationTrace::CallSite)
        )
    }

    pub fn is_propagation(&self) -> bool {
        matches!(
            self,
            CallKind::Propagation | CallKind::PropagationWithTrace(_)
        )
    }
}

/// How deep a propagation preserves input structure at an output path leaf.
///
/// Join takes the minimum depth (more collapsing); `NoCollapse` preserves the
/// whole shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollapseDepth {
    /// Absent.
    Bottom,
    /// Allow `depth` levels of structure; join everything deeper into it.
    /// Zero collapses the whole input into the leaf.
    Collapse(u32),
    /// Preserve the input shape.
    NoCollapse,
}

impl CollapseDepth {
    pub fn zero() -> Self {
        CollapseDepth::Collapse(0)
    }

    pub fn should_collapse(&self) -> bool {
        matches!(self, CollapseDepth::Collapse(_))
    }

    /// Numeric depth; `u32::MAX` for `NoCollapse`.
    pub fn depth(&self) -> u32 {
        match self {
            CollapseDepth::Bottom => 0,
            CollapseDepth::Collapse(depth) => *depth,
            CollapseDepth::NoCollapse => u32::MAX,
        }
    }
}

impl AbstractDomain for CollapseDepth {
    fn bottom() -> Self {
        CollapseDepth::Bottom
    }

    fn is_bottom(&self) -> bool {
        matches!(self, CollapseDepth::Bottom)
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (CollapseDepth::Bottom, _) => true,
            (_, CollapseDepth::Bottom) => false,
            // Smaller depth collapses more and sits higher in the order.
            _ => other.depth() <= self.depth(),
        }
    }

    fn join_with(&mut self, other: &Self) {
        if self.is_bottom() {
            *self = *other;
        } else if !other.is_bottom() && other.depth() < self.depth() {
            *self = *other;
        }
    }
}

impl TreeValue for CollapseDepth {
    fn difference_with(&mut self, other: &Self) {
        if self.leq(other) {
            *self = CollapseDepth::Bottom;
        }
    }
}

/// An extra trace hop attached to a frame, used to chain exploitability
/// traces through source-as-transform sinks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExtraTrace {
    pub kind: Kind,
    pub callee: Option<MethodId>,
    pub position: Option<Position>,
    pub callee_port: PortRef,
    pub call_kind: CallKind,
}

/// One immutable unit of taint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: Kind,
    callee_port: PortRef,
    callee: Option<MethodId>,
    call_position: Option<Position>,
    call_kind: CallKind,
    distance: u32,
    interval: ClassIntervalContext,
    origins: OriginSet,
    inferred_features: FeatureMayAlwaysSet,
    locally_inferred_features: FeatureMayAlwaysSet,
    user_features: FeatureSet,
    via_type_of_ports: BTreeSet<PortRef>,
    via_value_of_ports: BTreeSet<PortRef>,
    canonical_names: BTreeSet<CanonicalName>,
    output_paths: PathTree<CollapseDepth>,
    local_positions: LocalPositionSet,
    extra_traces: BTreeSet<ExtraTrace>,
}

impl Frame {
    /// A declaration frame: distance 0, no callee, as written in a model.
    pub fn declaration(kind: Kind, callee_port: PortRef) -> Self {
        Self::with_call_kind(kind, callee_port, CallKind::Declaration)
    }

    /// A frame with the given call kind and defaults everywhere else.
    pub fn with_call_kind(kind: Kind, callee_port: PortRef, call_kind: CallKind) -> Self {
        Self {
            kind,
            callee_port,
            callee: None,
            call_position: None,
            call_kind,
            distance: 0,
            interval: ClassIntervalContext::top(),
            origins: OriginSet::new(),
            inferred_features: FeatureMayAlwaysSet::new(),
            locally_inferred_features: FeatureMayAlwaysSet::new(),
            user_features: FeatureSet::new(),
            via_type_of_ports: BTreeSet::new(),
            via_value_of_ports: BTreeSet::new(),
            canonical_names: BTreeSet::new(),
            output_paths: PathTree::bottom(),
            local_positions: LocalPositionSet::Bottom,
            extra_traces: BTreeSet::new(),
        }
    }

    pub fn with_callee(mut self, callee: MethodId) -> Self {
        self.callee = Some(callee);
        self
    }

    pub fn with_call_position(mut self, position: Position) -> Self {
        self.call_position = Some(position);
        self
    }

    pub fn with_distance(mut self, distance: u32) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_interval(mut self, interval: ClassIntervalContext) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_origins(mut self, origins: OriginSet) -> Self {
        self.origins = origins;
        self
    }

    pub fn with_inferred_features(mut self, features: FeatureMayAlwaysSet) -> Self {
        self.inferred_features = features;
        self
    }

    pub fn with_locally_inferred_features(mut self, features: FeatureMayAlwaysSet) -> Self {
        self.locally_inferred_features = features;
        self
    }

    pub fn with_user_features(mut self, features: FeatureSet) -> Self {
        self.user_features = features;
        self
    }

    pub fn with_via_type_of_ports(mut self, ports: impl IntoIterator<Item = PortRef>) -> Self {
        self.via_type_of_ports = ports.into_iter().collect();
        self
    }

    pub fn with_via_value_of_ports(mut self, ports: impl IntoIterator<Item = PortRef>) -> Self {
        self.via_value_of_ports = ports.into_iter().collect();
        self
    }

    pub fn with_canonical_names(
        mut self,
        names: impl IntoIterator<Item = CanonicalName>,
    ) -> Self {
        self.canonical_names = names.into_iter().collect();
        self
    }

    pub fn with_output_paths(mut self, output_paths: PathTree<CollapseDepth>) -> Self {
        self.output_paths = output_paths;
        self
    }

    pub fn with_extra_traces(mut self, traces: impl IntoIterator<Item = ExtraTrace>) -> Self {
        self.extra_traces = traces.into_iter().collect();
        self
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn callee_port(&self) -> &PortRef {
        &self.callee_port
    }

    pub fn callee(&self) -> Option<&MethodId> {
        self.callee.as_ref()
    }

    pub fn call_position(&self) -> Option<&Position> {
        self.call_position.as_ref()
    }

    pub fn call_kind(&self) -> CallKind {
        self.call_kind
    }

    pub fn distance(&self) -> u32 {
        self.distance
    }

    pub fn interval(&self) -> &ClassIntervalContext {
        &self.interval
    }

    pub fn origins(&self) -> &OriginSet {
        &self.origins
    }

    pub fn inferred_features(&self) -> &FeatureMayAlwaysSet {
        &self.inferred_features
    }

    pub fn locally_inferred_features(&self) -> &FeatureMayAlwaysSet {
        &self.locally_inferred_features
    }

    pub fn user_features(&self) -> &FeatureSet {
        &self.user_features
    }

    pub fn canonical_names(&self) -> impl Iterator<Item = &CanonicalName> {
        self.canonical_names.iter()
    }

    pub fn output_paths(&self) -> &PathTree<CollapseDepth> {
        &self.output_paths
    }

    pub fn local_positions(&self) -> &LocalPositionSet {
        &self.local_positions
    }

    pub fn extra_traces(&self) -> impl Iterator<Item = &ExtraTrace> {
        self.extra_traces.iter()
    }

    /// All features of this frame joined into one may/always set.
    pub fn features_joined(&self) -> FeatureMayAlwaysSet {
        let mut features = self.inferred_features.clone();
        features.add_set(&self.locally_inferred_features);
        features.add_always_set(&self.user_features);
        features
    }

    pub(crate) fn set_kind(&mut self, kind: Kind) {
        self.kind = kind;
    }

    pub(crate) fn set_call_position(&mut self, position: Position) {
        self.call_position = Some(position);
    }

    pub(crate) fn set_callee_port(&mut self, port: PortRef) {
        self.callee_port = port;
    }

    pub(crate) fn set_callee(&mut self, callee: Option<MethodId>) {
        self.callee = callee;
    }

    pub(crate) fn set_call_kind(&mut self, call_kind: CallKind) {
        self.call_kind = call_kind;
    }

    pub(crate) fn add_origin(&mut self, origin: crate::origin::Origin) {
        self.origins.add(origin);
    }

    pub(crate) fn add_locally_inferred_features(&mut self, features: &FeatureMayAlwaysSet) {
        self.locally_inferred_features.add_set(features);
    }

    pub(crate) fn add_local_position(&mut self, position: Position, max_positions: usize) {
        self.local_positions.add(position, max_positions);
    }

    pub(crate) fn set_user_features(&mut self, features: FeatureSet) {
        self.user_features = features;
    }

    pub(crate) fn clear_local_positions(&mut self) {
        self.local_positions = LocalPositionSet::Bottom;
    }

    /// Partial order between frames with equal grouping keys.
    pub fn leq(&self, other: &Frame) -> bool {
        debug_assert!(self.kind == other.kind, "leq requires equal kinds");
        self.distance >= other.distance
            && self.origins.leq(&other.origins)
            && self.inferred_features.leq(&other.inferred_features)
            && self
                .locally_inferred_features
                .leq(&other.locally_inferred_features)
            && self.user_features.is_subset_of(&other.user_features)
            && self.via_type_of_ports.is_subset(&other.via_type_of_ports)
            && self.via_value_of_ports.is_subset(&other.via_value_of_ports)
            && self.canonical_names.is_subset(&other.canonical_names)
            && self.output_paths.leq(&other.output_paths)
            && self.local_positions.leq(&other.local_positions)
            && self.extra_traces.is_subset(&other.extra_traces)
    }

    /// Join with a frame sharing the grouping key: minimum distance, unions
    /// of sets, lattice join of features, tree join of output paths.
    pub fn join_with(&mut self, other: &Frame) {
        debug_assert!(self.kind == other.kind, "join requires equal kinds");
        self.distance = self.distance.min(other.distance);
        self.origins.join_with(&other.origins);
        self.inferred_features.join_with(&other.inferred_features);
        self.locally_inferred_features
            .join_with(&other.locally_inferred_features);
        self.user_features.union_with(&other.user_features);
        self.via_type_of_ports
            .extend(other.via_type_of_ports.iter().cloned());
        self.via_value_of_ports
            .extend(other.via_value_of_ports.iter().cloned());
        self.canonical_names
            .extend(other.canonical_names.iter().cloned());
        self.output_paths.join_with(&other.output_paths);
        self.local_positions.join_with(&other.local_positions);
        self.extra_traces.extend(other.extra_traces.iter().cloned());
    }

    /// Instantiate this frame at a call site. Returns `None` when the frame
    /// is dropped (distance cap or empty interval intersection).
    pub fn propagate(&self, context: &PropagateContext<'_>) -> Option<Frame> {
        let call_kind = self.call_kind.propagate();
        let distance = if call_kind.is_call_site() {
            self.distance.saturating_add(1).max(1)
        } else {
            0
        };
        if distance > context.max_source_sink_distance {
            return None;
        }

        let interval = self.interval.propagate(&context.caller_interval)?;

        // The callee's summary features become inferred features of the call;
        // user features are promoted to always-inferred.
        let mut inferred_features = self.inferred_features.clone();
        inferred_features.add_set(&self.locally_inferred_features);
        inferred_features.add_always_set(&self.user_features);

        let factories = context.factories;
        for port in &self.via_type_of_ports {
            let type_name = port
                .root()
                .argument_index()
                .and_then(|index| context.source_register_types.get(&index))
                .map(|type_id| factories.resolve_type(type_id))
                .unwrap_or(constants::UNKNOWN_VIA_ANNOTATION);
            inferred_features.add_always(factories.features.get_via_type_of(type_name));
        }
        for port in &self.via_value_of_ports {
            let value = port
                .root()
                .argument_index()
                .and_then(|index| context.source_constant_arguments.get(&index))
                .map(|literal| factories.resolve_literal(literal))
                .unwrap_or(constants::UNKNOWN_VIA_ANNOTATION);
            inferred_features.add_always(factories.features.get_via_value_of(value));
        }

        let canonical_names: BTreeSet<CanonicalName> = self
            .canonical_names
            .iter()
            .filter_map(|name| match name {
                CanonicalName::Instantiated(_) => Some(name.clone()),
                CanonicalName::Template(template) => {
                    if factories.resolve_literal(template)
                        == constants::CANONICAL_TEMPLATE_LEAF_NAME
                    {
                        let leaf = factories.method_leaf_name(&context.callee).to_string();
                        Some(CanonicalName::Instantiated(factories.literal(&leaf)))
                    } else {
                        None
                    }
                }
            })
            .collect();

        Some(Frame {
            kind: self.kind.clone(),
            callee_port: context.callee_port.clone(),
            callee: Some(context.callee),
            call_position: Some(context.call_position.clone()),
            call_kind,
            distance,
            interval,
            origins: self.origins.clone(),
            inferred_features,
            locally_inferred_features: context.extra_features.clone(),
            user_features: FeatureSet::new(),
            via_type_of_ports: BTreeSet::new(),
            via_value_of_ports: BTreeSet::new(),
            canonical_names,
            output_paths: self.output_paths.clone(),
            local_positions: LocalPositionSet::Bottom,
            extra_traces: self.extra_traces.clone(),
        })
    }
}
