//! Per-method summary models.
//!
//! A model collects what is known about one method: the taint it produces
//! (generations), receives (parameter sources), absorbs (sinks), moves
//! (propagations), suppresses (sanitizers), plus feature attachments, inline
//! shortcuts, analysis modes, and the issues found in its body.
//!
//! Models are joined across fixed-point iterations; frozen facts absorb the
//! unfrozen side so a pinned fact survives iteration.

pub mod issue;
pub mod json;
pub mod sanitizer;

pub use issue::{Issue, IssueSet};
pub use sanitizer::{SanitizedKinds, Sanitizer, SanitizerKind};

use sift_core::config::Heuristics;
use sift_core::errors::{ModelError, SiftErrorCode};
use sift_core::types::collections::{BTreeMap, BTreeSet};
use sift_core::types::{FeatureId, MethodId, ModelGeneratorId};
use tracing::warn;

use crate::access_path::{AccessPath, Root};
use crate::domain::AbstractDomain;
use crate::factories::Factories;
use crate::feature::FeatureSet;
use crate::position::Position;
use crate::taint::tree::TaintAccessPathTree;
use crate::taint::Taint;
use crate::tree::UpdateKind;

/// Analysis modes, as a bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modes(u32);

impl Modes {
    pub const NORMAL: Modes = Modes(0);
    /// Do not analyze the method body; use the declared model only.
    pub const SKIP_ANALYSIS: Modes = Modes(1);
    /// Attach `via-obscure` to taint flowing through the method.
    pub const ADD_VIA_OBSCURE_FEATURE: Modes = Modes(1 << 1);
    /// Taint flowing into any argument flows out of the return value.
    pub const TAINT_IN_TAINT_OUT: Modes = Modes(1 << 2);
    /// Taint flowing into any argument taints the receiver.
    pub const TAINT_IN_TAINT_THIS: Modes = Modes(1 << 3);
    /// Do not join models across virtual overrides.
    pub const NO_JOIN_VIRTUAL_OVERRIDES: Modes = Modes(1 << 4);
    /// Ignore collapse depths when applying propagations.
    pub const NO_COLLAPSE_ON_PROPAGATION: Modes = Modes(1 << 5);
    /// Alias result memory locations on invoke.
    pub const ALIAS_MEMORY_LOCATION_ON_INVOKE: Modes = Modes(1 << 6);
    /// Propagation writes are strong instead of weak.
    pub const STRONG_WRITE_ON_PROPAGATION: Modes = Modes(1 << 7);

    pub fn contains(&self, mode: Modes) -> bool {
        self.0 & mode.0 == mode.0 && mode.0 != 0
    }

    pub fn insert(&mut self, mode: Modes) {
        self.0 |= mode.0;
    }

    pub fn union(self, other: Modes) -> Modes {
        Modes(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Mode names for serialization, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        const ALL: &[(Modes, &str)] = &[
            (Modes::SKIP_ANALYSIS, "skip-analysis"),
            (Modes::ADD_VIA_OBSCURE_FEATURE, "add-via-obscure-feature"),
            (Modes::TAINT_IN_TAINT_OUT, "taint-in-taint-out"),
            (Modes::TAINT_IN_TAINT_THIS, "taint-in-taint-this"),
            (Modes::NO_JOIN_VIRTUAL_OVERRIDES, "no-join-virtual-overrides"),
            (Modes::NO_COLLAPSE_ON_PROPAGATION, "no-collapse-on-propagation"),
            (
                Modes::ALIAS_MEMORY_LOCATION_ON_INVOKE,
                "alias-memory-location-on-invoke",
            ),
            (
                Modes::STRONG_WRITE_ON_PROPAGATION,
                "strong-write-on-propagation",
            ),
        ];
        ALL.iter()
            .filter(|(mode, _)| self.contains(*mode))
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn from_name(name: &str) -> Option<Modes> {
        match name {
            "skip-analysis" => Some(Modes::SKIP_ANALYSIS),
            "add-via-obscure-feature" => Some(Modes::ADD_VIA_OBSCURE_FEATURE),
            "taint-in-taint-out" => Some(Modes::TAINT_IN_TAINT_OUT),
            "taint-in-taint-this" => Some(Modes::TAINT_IN_TAINT_THIS),
            "no-join-virtual-overrides" => Some(Modes::NO_JOIN_VIRTUAL_OVERRIDES),
            "no-collapse-on-propagation" => Some(Modes::NO_COLLAPSE_ON_PROPAGATION),
            "alias-memory-location-on-invoke" => Some(Modes::ALIAS_MEMORY_LOCATION_ON_INVOKE),
            "strong-write-on-propagation" => Some(Modes::STRONG_WRITE_ON_PROPAGATION),
            _ => None,
        }
    }
}

/// Which model facts are frozen, as a bitset. Once frozen, `leq` and `join`
/// treat the frozen side as absorbing, pinning the fact across iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frozen(u8);

impl Frozen {
    pub const NONE: Frozen = Frozen(0);
    pub const GENERATIONS: Frozen = Frozen(1);
    pub const PARAMETER_SOURCES: Frozen = Frozen(1 << 1);
    pub const SINKS: Frozen = Frozen(1 << 2);
    pub const PROPAGATIONS: Frozen = Frozen(1 << 3);

    pub fn contains(&self, frozen: Frozen) -> bool {
        self.0 & frozen.0 == frozen.0 && frozen.0 != 0
    }

    pub fn insert(&mut self, frozen: Frozen) {
        self.0 |= frozen.0;
    }

    pub fn names(&self) -> Vec<&'static str> {
        const ALL: &[(Frozen, &str)] = &[
            (Frozen::GENERATIONS, "generations"),
            (Frozen::PARAMETER_SOURCES, "parameter_sources"),
            (Frozen::SINKS, "sinks"),
            (Frozen::PROPAGATIONS, "propagation"),
        ];
        ALL.iter()
            .filter(|(frozen, _)| self.contains(*frozen))
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn from_name(name: &str) -> Option<Frozen> {
        match name {
            "generations" => Some(Frozen::GENERATIONS),
            "parameter_sources" => Some(Frozen::PARAMETER_SOURCES),
            "sinks" => Some(Frozen::SINKS),
            "propagation" => Some(Frozen::PROPAGATIONS),
            _ => None,
        }
    }
}

/// The shape of a method, as resolved by the driver.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub id: MethodId,
    /// Number of parameters, including the receiver for instance methods.
    pub arity: u8,
    pub is_static: bool,
    pub returns_void: bool,
    /// Methods carrying parameter-type overrides never report issues; the
    /// un-overridden copy does.
    pub parameter_type_overrides: bool,
    /// Position of the method entry, attached to parameter sources.
    pub entry_position: Position,
}

/// An `inline-as-setter` shortcut: the method writes `value` into `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAsSetter {
    pub target: AccessPath,
    pub value: AccessPath,
}

/// A per-method summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    method: Option<MethodId>,
    modes: Modes,
    frozen: Frozen,
    generations: TaintAccessPathTree,
    parameter_sources: TaintAccessPathTree,
    sinks: TaintAccessPathTree,
    call_effect_sources: TaintAccessPathTree,
    call_effect_sinks: TaintAccessPathTree,
    propagations: TaintAccessPathTree,
    global_sanitizers: BTreeSet<Sanitizer>,
    port_sanitizers: BTreeMap<Root, BTreeSet<Sanitizer>>,
    attach_to_sources: BTreeMap<Root, FeatureSet>,
    attach_to_sinks: BTreeMap<Root, FeatureSet>,
    attach_to_propagations: BTreeMap<Root, FeatureSet>,
    add_features_to_arguments: BTreeMap<Root, FeatureSet>,
    inline_as_getter: Option<AccessPath>,
    inline_as_setter: Option<InlineAsSetter>,
    model_generators: BTreeSet<ModelGeneratorId>,
    issues: IssueSet,
}

/// Report a model inconsistency and continue with the fragment dropped.
fn report_inconsistency(error: &ModelError) {
    warn!(target: "sift::model", "{}", error.coded_string());
}

fn leq_frozen<D: AbstractDomain>(
    left: &D,
    right: &D,
    left_frozen: bool,
    right_frozen: bool,
) -> bool {
    if left_frozen == right_frozen {
        left.leq(right)
    } else {
        right_frozen
    }
}

fn join_with_frozen<D: AbstractDomain>(
    left: &mut D,
    right: &D,
    left_frozen: bool,
    right_frozen: bool,
) {
    if left_frozen == right_frozen {
        left.join_with(right);
    } else if right_frozen {
        *left = right.clone();
    }
}

impl Model {
    pub fn new(method: MethodId) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    pub fn method(&self) -> Option<&MethodId> {
        self.method.as_ref()
    }

    pub fn modes(&self) -> Modes {
        self.modes
    }

    pub fn add_mode(&mut self, mode: Modes) {
        self.modes.insert(mode);
    }

    pub fn skip_analysis(&self) -> bool {
        self.modes.contains(Modes::SKIP_ANALYSIS)
    }

    pub fn add_via_obscure_feature(&self) -> bool {
        self.modes.contains(Modes::ADD_VIA_OBSCURE_FEATURE)
    }

    pub fn no_collapse_on_propagation(&self) -> bool {
        self.modes.contains(Modes::NO_COLLAPSE_ON_PROPAGATION)
    }

    pub fn strong_write_on_propagation(&self) -> bool {
        self.modes.contains(Modes::STRONG_WRITE_ON_PROPAGATION)
    }

    pub fn frozen(&self) -> Frozen {
        self.frozen
    }

    pub fn is_frozen(&self, frozen: Frozen) -> bool {
        self.frozen.contains(frozen)
    }

    pub fn freeze(&mut self, frozen: Frozen) {
        self.frozen.insert(frozen);
    }

    pub fn generations(&self) -> &TaintAccessPathTree {
        &self.generations
    }

    pub fn parameter_sources(&self) -> &TaintAccessPathTree {
        &self.parameter_sources
    }

    pub fn sinks(&self) -> &TaintAccessPathTree {
        &self.sinks
    }

    pub fn call_effect_sources(&self) -> &TaintAccessPathTree {
        &self.call_effect_sources
    }

    pub fn call_effect_sinks(&self) -> &TaintAccessPathTree {
        &self.call_effect_sinks
    }

    pub fn propagations(&self) -> &TaintAccessPathTree {
        &self.propagations
    }

    pub fn issues(&self) -> &IssueSet {
        &self.issues
    }

    pub fn model_generators(&self) -> impl Iterator<Item = &ModelGeneratorId> {
        self.model_generators.iter()
    }

    pub fn add_model_generator(&mut self, generator: ModelGeneratorId) {
        self.model_generators.insert(generator);
    }

    pub fn inline_as_getter(&self) -> Option<&AccessPath> {
        self.inline_as_getter.as_ref()
    }

    pub fn inline_as_setter(&self) -> Option<&InlineAsSetter> {
        self.inline_as_setter.as_ref()
    }

    pub fn set_inline_as_getter(&mut self, access_path: AccessPath) {
        self.inline_as_getter = Some(access_path);
    }

    pub fn set_inline_as_setter(&mut self, setter: InlineAsSetter) {
        self.inline_as_setter = Some(setter);
    }

    fn check_root(&self, root: Root, info: &MethodInfo) -> Result<(), ModelError> {
        match root {
            Root::Argument(index) if index >= info.arity => Err(ModelError::PortOutOfBounds {
                index,
                arity: info.arity,
            }),
            Root::Return if info.returns_void => Err(ModelError::ReturnOnVoid(format!(
                "method id {:?}",
                info.id
            ))),
            _ => Ok(()),
        }
    }

    /// Write taint into one of the model trees, enforcing the port cap and
    /// the leaf cap with the widening broadening feature.
    fn write_bounded(
        tree: &mut TaintAccessPathTree,
        port: &AccessPath,
        taint: Taint,
        max_port_size: usize,
        max_leaves: usize,
        broadening_feature: FeatureId,
    ) {
        let port = if port.path().len() > max_port_size {
            port.truncated(max_port_size)
        } else {
            port.clone()
        };
        tree.write_value(&port, taint, UpdateKind::Weak);
        tree.limit_leaves(max_leaves, crate::taint::tree::broadening(broadening_feature));
    }

    /// Add a generation: taint produced at the method's return or written
    /// into an argument. Inconsistent fragments are dropped.
    pub fn add_generation(
        &mut self,
        port: &AccessPath,
        taint: Taint,
        info: &MethodInfo,
        heuristics: &Heuristics,
        factories: &Factories,
    ) {
        if let Err(error) = self.check_root(port.root(), info) {
            report_inconsistency(&error);
            return;
        }
        if !matches!(port.root(), Root::Return | Root::Argument(_)) {
            report_inconsistency(&ModelError::Inconsistent(format!(
                "generation port must be Return or Argument, got {}",
                port.root()
            )));
            return;
        }
        Self::write_bounded(
            &mut self.generations,
            port,
            taint,
            heuristics.effective_generation_max_port_size(),
            heuristics.effective_generation_max_output_path_leaves(),
            factories.features.get_widen_broadening(),
        );
    }

    /// Add a parameter source: taint received at a parameter.
    pub fn add_parameter_source(
        &mut self,
        port: &AccessPath,
        taint: Taint,
        info: &MethodInfo,
        heuristics: &Heuristics,
        factories: &Factories,
    ) {
        if !port.root().is_argument() {
            report_inconsistency(&ModelError::Inconsistent(format!(
                "parameter source port must be an Argument, got {}",
                port.root()
            )));
            return;
        }
        if let Err(error) = self.check_root(port.root(), info) {
            report_inconsistency(&error);
            return;
        }
        Self::write_bounded(
            &mut self.parameter_sources,
            port,
            taint,
            heuristics.effective_parameter_source_max_port_size(),
            heuristics.effective_parameter_source_max_output_path_leaves(),
            factories.features.get_widen_broadening(),
        );
    }

    /// Add a sink: taint absorbed at a port.
    pub fn add_sink(
        &mut self,
        port: &AccessPath,
        taint: Taint,
        info: &MethodInfo,
        heuristics: &Heuristics,
        factories: &Factories,
    ) {
        if let Err(error) = self.check_root(port.root(), info) {
            report_inconsistency(&error);
            return;
        }
        Self::write_bounded(
            &mut self.sinks,
            port,
            taint,
            heuristics.effective_sink_max_port_size(),
            heuristics.effective_sink_max_input_path_leaves(),
            factories.features.get_widen_broadening(),
        );
    }

    /// Add a call-effect source.
    pub fn add_call_effect_source(
        &mut self,
        port: &AccessPath,
        taint: Taint,
        heuristics: &Heuristics,
        factories: &Factories,
    ) {
        if !port.root().is_call_effect() {
            report_inconsistency(&ModelError::Inconsistent(format!(
                "call-effect source port must be a call-effect root, got {}",
                port.root()
            )));
            return;
        }
        Self::write_bounded(
            &mut self.call_effect_sources,
            port,
            taint,
            heuristics.effective_call_effect_source_max_port_size(),
            heuristics.effective_sink_max_input_path_leaves(),
            factories.features.get_widen_broadening(),
        );
    }

    /// Add a call-effect sink.
    pub fn add_call_effect_sink(
        &mut self,
        port: &AccessPath,
        taint: Taint,
        heuristics: &Heuristics,
        factories: &Factories,
    ) {
        if !port.root().is_call_effect() {
            report_inconsistency(&ModelError::Inconsistent(format!(
                "call-effect sink port must be a call-effect root, got {}",
                port.root()
            )));
            return;
        }
        Self::write_bounded(
            &mut self.call_effect_sinks,
            port,
            taint,
            heuristics.effective_call_effect_sink_max_port_size(),
            heuristics.effective_sink_max_input_path_leaves(),
            factories.features.get_widen_broadening(),
        );
    }

    /// Add a propagation: taint entering at `input_path` leaves through the
    /// propagation frames' output.
    pub fn add_propagation(
        &mut self,
        input_path: &AccessPath,
        taint: Taint,
        info: &MethodInfo,
        heuristics: &Heuristics,
        factories: &Factories,
    ) {
        if !input_path.root().is_argument() {
            report_inconsistency(&ModelError::Inconsistent(format!(
                "propagation input must be rooted at an Argument, got {}",
                input_path.root()
            )));
            return;
        }
        if let Err(error) = self.check_root(input_path.root(), info) {
            report_inconsistency(&error);
            return;
        }
        for frame in taint.frames() {
            match frame.kind().propagation_output() {
                None => {
                    report_inconsistency(&ModelError::Inconsistent(
                        "propagation frames must carry a propagation kind".to_string(),
                    ));
                    return;
                }
                Some(crate::kind::PropagationOutput::Argument(index)) if index >= info.arity => {
                    report_inconsistency(&ModelError::PortOutOfBounds {
                        index,
                        arity: info.arity,
                    });
                    return;
                }
                Some(crate::kind::PropagationOutput::Return) if info.returns_void => {
                    report_inconsistency(&ModelError::ReturnOnVoid(
                        "propagation output".to_string(),
                    ));
                    return;
                }
                _ => {}
            }
        }
        Self::write_bounded(
            &mut self.propagations,
            input_path,
            taint,
            heuristics.effective_propagation_max_input_path_size(),
            heuristics.effective_propagation_max_input_path_leaves(),
            factories.features.get_propagation_broadening(),
        );
    }

    pub fn add_issue(&mut self, issue: Issue) {
        self.issues.add(issue);
    }

    pub fn add_global_sanitizer(&mut self, sanitizer: Sanitizer) {
        self.global_sanitizers.insert(sanitizer);
    }

    pub fn add_port_sanitizer(&mut self, root: Root, sanitizer: Sanitizer) {
        self.port_sanitizers.entry(root).or_default().insert(sanitizer);
    }

    /// Whether `kind` is sanitized in `role` at `root`.
    pub fn is_sanitized(&self, kind: &crate::kind::Kind, role: SanitizerKind, root: Root) -> bool {
        self.global_sanitizers
            .iter()
            .any(|sanitizer| sanitizer.sanitizes(kind, role))
            || self
                .port_sanitizers
                .get(&root)
                .map(|sanitizers| {
                    sanitizers
                        .iter()
                        .any(|sanitizer| sanitizer.sanitizes(kind, role))
                })
                .unwrap_or(false)
    }

    /// A copy of `taint` with sanitized kinds removed.
    pub fn sanitize_taint(&self, taint: &Taint, role: SanitizerKind, root: Root) -> Taint {
        let mut result = taint.clone();
        result.filter_kinds(|kind| !self.is_sanitized(kind, role, root));
        result
    }

    pub fn add_attach_to_sources(&mut self, root: Root, features: FeatureSet) {
        self.attach_to_sources.entry(root).or_default().union_with(&features);
    }

    pub fn add_attach_to_sinks(&mut self, root: Root, features: FeatureSet) {
        self.attach_to_sinks.entry(root).or_default().union_with(&features);
    }

    pub fn add_attach_to_propagations(&mut self, root: Root, features: FeatureSet) {
        self.attach_to_propagations
            .entry(root)
            .or_default()
            .union_with(&features);
    }

    pub fn add_add_features_to_arguments(&mut self, root: Root, features: FeatureSet) {
        self.add_features_to_arguments
            .entry(root)
            .or_default()
            .union_with(&features);
    }

    pub fn attach_to_sources(&self, root: Root) -> FeatureSet {
        self.attach_to_sources.get(&root).cloned().unwrap_or_default()
    }

    pub fn attach_to_sinks(&self, root: Root) -> FeatureSet {
        self.attach_to_sinks.get(&root).cloned().unwrap_or_default()
    }

    pub fn attach_to_propagations(&self, root: Root) -> FeatureSet {
        self.attach_to_propagations
            .get(&root)
            .cloned()
            .unwrap_or_default()
    }

    pub fn add_features_to_arguments(&self, root: Root) -> FeatureSet {
        self.add_features_to_arguments
            .get(&root)
            .cloned()
            .unwrap_or_default()
    }

    pub fn has_add_features_to_arguments(&self) -> bool {
        !self.add_features_to_arguments.is_empty()
    }

    pub fn leq(&self, other: &Model) -> bool {
        leq_frozen(
            &self.generations,
            &other.generations,
            self.is_frozen(Frozen::GENERATIONS),
            other.is_frozen(Frozen::GENERATIONS),
        ) && leq_frozen(
            &self.parameter_sources,
            &other.parameter_sources,
            self.is_frozen(Frozen::PARAMETER_SOURCES),
            other.is_frozen(Frozen::PARAMETER_SOURCES),
        ) && leq_frozen(
            &self.sinks,
            &other.sinks,
            self.is_frozen(Frozen::SINKS),
            other.is_frozen(Frozen::SINKS),
        ) && leq_frozen(
            &self.propagations,
            &other.propagations,
            self.is_frozen(Frozen::PROPAGATIONS),
            other.is_frozen(Frozen::PROPAGATIONS),
        ) && self.call_effect_sources.leq(&other.call_effect_sources)
            && self.call_effect_sinks.leq(&other.call_effect_sinks)
            && self.global_sanitizers.is_subset(&other.global_sanitizers)
            && map_leq(&self.port_sanitizers, &other.port_sanitizers, |left, right| {
                left.is_subset(right)
            })
            && map_leq(&self.attach_to_sources, &other.attach_to_sources, |l, r| {
                l.is_subset_of(r)
            })
            && map_leq(&self.attach_to_sinks, &other.attach_to_sinks, |l, r| {
                l.is_subset_of(r)
            })
            && map_leq(
                &self.attach_to_propagations,
                &other.attach_to_propagations,
                |l, r| l.is_subset_of(r),
            )
            && map_leq(
                &self.add_features_to_arguments,
                &other.add_features_to_arguments,
                |l, r| l.is_subset_of(r),
            )
            && option_leq(&self.inline_as_getter, &other.inline_as_getter)
            && option_leq(&self.inline_as_setter, &other.inline_as_setter)
            && self.model_generators.is_subset(&other.model_generators)
            && self.issues.leq(&other.issues)
    }

    pub fn join_with(&mut self, other: &Model) {
        if self.method.is_none() {
            self.method = other.method;
        }
        self.modes = self.modes.union(other.modes);
        let left_frozen = self.frozen;
        let right_frozen = other.frozen;
        self.frozen.0 |= other.frozen.0;

        join_with_frozen(
            &mut self.generations,
            &other.generations,
            left_frozen.contains(Frozen::GENERATIONS),
            right_frozen.contains(Frozen::GENERATIONS),
        );
        join_with_frozen(
            &mut self.parameter_sources,
            &other.parameter_sources,
            left_frozen.contains(Frozen::PARAMETER_SOURCES),
            right_frozen.contains(Frozen::PARAMETER_SOURCES),
        );
        join_with_frozen(
            &mut self.sinks,
            &other.sinks,
            left_frozen.contains(Frozen::SINKS),
            right_frozen.contains(Frozen::SINKS),
        );
        join_with_frozen(
            &mut self.propagations,
            &other.propagations,
            left_frozen.contains(Frozen::PROPAGATIONS),
            right_frozen.contains(Frozen::PROPAGATIONS),
        );

        self.call_effect_sources.join_with(&other.call_effect_sources);
        self.call_effect_sinks.join_with(&other.call_effect_sinks);
        self.global_sanitizers
            .extend(other.global_sanitizers.iter().cloned());
        for (root, sanitizers) in &other.port_sanitizers {
            self.port_sanitizers
                .entry(*root)
                .or_default()
                .extend(sanitizers.iter().cloned());
        }
        for (root, features) in &other.attach_to_sources {
            self.attach_to_sources.entry(*root).or_default().union_with(features);
        }
        for (root, features) in &other.attach_to_sinks {
            self.attach_to_sinks.entry(*root).or_default().union_with(features);
        }
        for (root, features) in &other.attach_to_propagations {
            self.attach_to_propagations
                .entry(*root)
                .or_default()
                .union_with(features);
        }
        for (root, features) in &other.add_features_to_arguments {
            self.add_features_to_arguments
                .entry(*root)
                .or_default()
                .union_with(features);
        }

        join_constant(&mut self.inline_as_getter, &other.inline_as_getter);
        join_constant_setter(&mut self.inline_as_setter, &other.inline_as_setter);

        self.model_generators
            .extend(other.model_generators.iter().cloned());
        self.issues.join_with(&other.issues);
    }
}

fn map_leq<K: Ord, V>(
    left: &BTreeMap<K, V>,
    right: &BTreeMap<K, V>,
    value_leq: impl Fn(&V, &V) -> bool,
) -> bool {
    left.iter().all(|(key, value)| {
        right
            .get(key)
            .map(|other| value_leq(value, other))
            .unwrap_or(false)
    })
}

fn option_leq<T: PartialEq>(left: &Option<T>, right: &Option<T>) -> bool {
    match (left, right) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(left), Some(right)) => left == right,
    }
}

/// Inline shortcuts behave like constant domains: joining disagreeing values
/// drops the shortcut.
fn join_constant(left: &mut Option<AccessPath>, right: &Option<AccessPath>) {
    let Some(value) = right else { return };
    match left.take() {
        None => *left = Some(value.clone()),
        Some(current) if current == *value => *left = Some(current),
        Some(_) => {
            warn!(target: "sift::model", "Conflicting inline-as-getter paths; dropping the shortcut");
        }
    }
}

fn join_constant_setter(left: &mut Option<InlineAsSetter>, right: &Option<InlineAsSetter>) {
    let Some(value) = right else { return };
    match left.take() {
        None => *left = Some(value.clone()),
        Some(current) if current == *value => *left = Some(current),
        Some(_) => {
            warn!(target: "sift::model", "Conflicting inline-as-setter paths; dropping the shortcut");
        }
    }
}

impl AbstractDomain for Model {
    fn bottom() -> Self {
        Self::default()
    }

    fn is_bottom(&self) -> bool {
        self.generations.is_bottom()
            && self.parameter_sources.is_bottom()
            && self.sinks.is_bottom()
            && self.call_effect_sources.is_bottom()
            && self.call_effect_sinks.is_bottom()
            && self.propagations.is_bottom()
            && self.global_sanitizers.is_empty()
            && self.port_sanitizers.is_empty()
            && self.attach_to_sources.is_empty()
            && self.attach_to_sinks.is_empty()
            && self.attach_to_propagations.is_empty()
            && self.add_features_to_arguments.is_empty()
            && self.inline_as_getter.is_none()
            && self.inline_as_setter.is_none()
            && self.model_generators.is_empty()
            && self.issues.is_empty()
            && self.modes.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        Model::leq(self, other)
    }

    fn join_with(&mut self, other: &Self) {
        Model::join_with(self, other)
    }
}
