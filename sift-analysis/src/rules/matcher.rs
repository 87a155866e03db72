//! The flow matcher: rules against the cartesian product of source and sink
//! kinds at one call site or field access.

use sift_core::config::Heuristics;
use sift_core::types::MethodId;

use crate::domain::AbstractDomain;
use crate::factories::Factories;
use crate::feature::{FeatureMayAlwaysSet, FeatureSet};
use crate::kind::{Kind, KindData};
use crate::model::{Issue, MethodInfo, Model};
use crate::position::Position;
use crate::taint::{Frame, Taint};
use crate::transfer::oracle::ClassPropertiesOracle;

use super::partial::FulfilledPartialKindState;
use super::{RuleRef, Rules};

/// Everything the matcher needs that is stable across one method analysis.
pub struct FlowCheckContext<'a> {
    pub factories: &'a Factories,
    pub heuristics: &'a Heuristics,
    pub rules: &'a Rules,
    pub class_properties: &'a dyn ClassPropertiesOracle,
    pub method: MethodInfo,
    /// The method's own call-effect exploitability sources, for collapsing
    /// partially-fulfilled exploitability rules.
    pub exploitability_sources: Taint,
}

/// Check every rule against the source and sink taint of one sink port.
///
/// Emits issues into `new_model` and records multi-source progress into
/// `partial_state` when one is provided. Iteration over kinds is
/// deterministic: partitions are ordered by the kinds' stable identity.
#[allow(clippy::too_many_arguments)]
pub fn check_flows(
    context: &FlowCheckContext<'_>,
    sources: &Taint,
    sinks: &Taint,
    position: &Position,
    sink_index: usize,
    callee: &str,
    callee_method: Option<MethodId>,
    extra_features: &FeatureMayAlwaysSet,
    mut partial_state: Option<&mut FulfilledPartialKindState>,
    new_model: &mut Model,
) {
    if sources.is_bottom() || sinks.is_bottom() {
        return;
    }

    let source_partitions = sources.partition_by_kind();
    let sink_partitions = sinks.partition_by_kind();

    for (source_kind, source_taint) in &source_partitions {
        if source_kind.is_propagation() || source_kind.is_artificial_source() {
            continue;
        }
        for (sink_kind, sink_taint) in &sink_partitions {
            let Some((source_taint, sink_taint)) =
                filter_by_intervals(source_taint, sink_taint)
            else {
                continue;
            };

            check_simple_rules(
                context,
                source_kind,
                &source_taint,
                sink_kind,
                &sink_taint,
                position,
                sink_index,
                callee,
                extra_features,
                new_model,
            );

            check_exploitability_rules(
                context,
                source_kind,
                &source_taint,
                sink_kind,
                &sink_taint,
                position,
                sink_index,
                callee,
                callee_method,
                extra_features,
                new_model,
            );

            if let Some(state) = partial_state.as_deref_mut() {
                check_partial_rules(
                    context,
                    source_kind,
                    &source_taint,
                    sink_kind,
                    &sink_taint,
                    position,
                    sink_index,
                    callee,
                    extra_features,
                    state,
                    new_model,
                );
            }

            check_triggered_rules(
                context,
                source_kind,
                &source_taint,
                sink_kind,
                &sink_taint,
                position,
                sink_index,
                callee,
                extra_features,
                new_model,
            );
        }
    }
}

/// Keep only frames whose intervals can coexist. Frames that do not preserve
/// type context always survive; a pair with no surviving frames on either
/// side is skipped entirely.
fn filter_by_intervals(sources: &Taint, sinks: &Taint) -> Option<(Taint, Taint)> {
    let intersects_any = |frame: &Frame, others: &Taint| {
        if !frame.interval().preserves_type_context {
            return true;
        }
        others.frames().any(|other| {
            !other.interval().preserves_type_context
                || frame.interval().interval.intersects(&other.interval().interval)
        })
    };

    let mut kept_sources = sources.clone();
    kept_sources.retain_frames(|frame| intersects_any(frame, sinks));
    let mut kept_sinks = sinks.clone();
    kept_sinks.retain_frames(|frame| intersects_any(frame, sources));

    if kept_sources.is_bottom() || kept_sinks.is_bottom() {
        return None;
    }
    Some((kept_sources, kept_sinks))
}

#[allow(clippy::too_many_arguments)]
fn check_simple_rules(
    context: &FlowCheckContext<'_>,
    source_kind: &Kind,
    source_taint: &Taint,
    sink_kind: &Kind,
    sink_taint: &Taint,
    position: &Position,
    sink_index: usize,
    callee: &str,
    extra_features: &FeatureMayAlwaysSet,
    new_model: &mut Model,
) {
    // Source-as-transform sinks are handled by the exploitability logic.
    if sink_kind.has_source_as_transform() || sink_kind.is_partial() || sink_kind.is_triggered() {
        return;
    }
    for rule in context.rules.rules_for(source_kind, sink_kind) {
        create_issue(
            context,
            rule.clone(),
            source_taint.clone(),
            sink_taint.clone(),
            &[source_kind.clone(), sink_kind.clone()],
            position,
            sink_index,
            callee,
            extra_features,
            new_model,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn check_exploitability_rules(
    context: &FlowCheckContext<'_>,
    source_kind: &Kind,
    source_taint: &Taint,
    sink_kind: &Kind,
    sink_taint: &Taint,
    position: &Position,
    sink_index: usize,
    callee: &str,
    callee_method: Option<MethodId>,
    extra_features: &FeatureMayAlwaysSet,
    new_model: &mut Model,
) {
    let factories = context.factories;

    if sink_kind.has_source_as_transform() {
        // The sink already embeds its transform source; a matching source
        // here completes the rule.
        let fulfilled = context
            .rules
            .exploitability_fulfilled_for(source_kind, sink_kind);
        if fulfilled.is_empty() {
            // Not yet exploitable: surface the sink at the method's
            // call-effect exploitability boundary for the backward analysis.
            let port = crate::access_path::AccessPath::from_root(
                crate::access_path::Root::CallEffectExploitability,
            );
            new_model.add_call_effect_sink(
                &port,
                sink_taint.clone(),
                context.heuristics,
                factories,
            );
            return;
        }
        for rule in fulfilled {
            let origins: Vec<_> = sink_taint
                .frames()
                .flat_map(|frame| frame.origins().exploitability_origins().cloned())
                .collect();
            if origins.is_empty() {
                create_issue(
                    context,
                    rule.clone(),
                    source_taint.clone(),
                    sink_taint.clone(),
                    &[source_kind.clone(), sink_kind.clone()],
                    position,
                    sink_index,
                    callee,
                    extra_features,
                    new_model,
                );
                continue;
            }
            for origin in origins {
                let mut features = extra_features.clone();
                if let crate::origin::OriginData::Exploitability { callee: origin_callee, .. } =
                    &*origin
                {
                    let name = factories.resolve_method(origin_callee).to_string();
                    features.add_always(factories.features.get(&name));
                }
                create_issue(
                    context,
                    rule.clone(),
                    source_taint.clone(),
                    sink_taint.clone(),
                    &[source_kind.clone(), sink_kind.clone()],
                    position,
                    sink_index,
                    callee,
                    &features,
                    new_model,
                );
            }
        }
        return;
    }

    // The other leg: this source may be applied as a transform over the sink.
    let partial_rules = context
        .rules
        .exploitability_partial_for(source_kind, sink_kind);
    for _rule in partial_rules {
        let transform = factories
            .transforms
            .list(vec![factories.transforms.source_as_transform(source_kind.clone())]);
        let sat_kind = factories.kinds.transform(
            sink_kind.clone(),
            transform,
            factories.transforms.empty(),
            &factories.transforms,
        );
        let mut sat_sink = sink_taint.transform_kind_with_features(
            |_| vec![sat_kind.clone()],
            |_| FeatureSet::new(),
        );
        sat_sink.map_frames(|frame| {
            frame.add_locally_inferred_features(&source_taint.features_joined());
        });
        if let Some(origin_callee) = callee_method {
            let origin = factories
                .origins
                .exploitability(origin_callee, position.clone());
            sat_sink.map_frames(|frame| frame.add_origin(origin.clone()));
        }

        // Trivially fulfilled when the method already carries exploitability
        // sources at its call-effect boundary.
        if !context.exploitability_sources.is_bottom() {
            let attached = context
                .exploitability_sources
                .attach_position(position, &factories.access_paths.leaf());
            check_flows(
                context,
                &attached,
                &sat_sink,
                position,
                sink_index,
                callee,
                callee_method,
                extra_features,
                None,
                new_model,
            );
        }

        // Record the partially-fulfilled sink for the backward analysis.
        let port = crate::access_path::AccessPath::from_root(
            crate::access_path::Root::CallEffectExploitability,
        );
        new_model.add_call_effect_sink(&port, sat_sink, context.heuristics, factories);
    }
}

#[allow(clippy::too_many_arguments)]
fn check_partial_rules(
    context: &FlowCheckContext<'_>,
    source_kind: &Kind,
    source_taint: &Taint,
    sink_kind: &Kind,
    sink_taint: &Taint,
    position: &Position,
    sink_index: usize,
    callee: &str,
    extra_features: &FeatureMayAlwaysSet,
    state: &mut FulfilledPartialKindState,
    new_model: &mut Model,
) {
    if !sink_kind.is_partial() {
        return;
    }
    for rule in context.rules.partial_rules_for(source_kind, sink_kind) {
        let issue_sink = state.fulfill_kind(
            rule,
            sink_kind,
            source_taint.features_joined(),
            sink_taint,
            &context.factories.kinds,
        );
        if let Some(issue_sink) = issue_sink {
            create_issue(
                context,
                rule.clone(),
                source_taint.clone(),
                issue_sink,
                &[source_kind.clone(), sink_kind.clone()],
                position,
                sink_index,
                callee,
                extra_features,
                new_model,
            );
        }
    }
}

/// A triggered partial sink fires as soon as a source for its own leg shows
/// up; its counterpart leg was fulfilled in another method.
#[allow(clippy::too_many_arguments)]
fn check_triggered_rules(
    context: &FlowCheckContext<'_>,
    source_kind: &Kind,
    source_taint: &Taint,
    sink_kind: &Kind,
    sink_taint: &Taint,
    position: &Position,
    sink_index: usize,
    callee: &str,
    extra_features: &FeatureMayAlwaysSet,
    new_model: &mut Model,
) {
    let KindData::TriggeredPartial { partial, rule_code } = &**sink_kind else {
        return;
    };
    let Some(rule) = context.rules.rule_by_code(*rule_code) else {
        return;
    };
    let KindData::Partial { label, .. } = &**partial else {
        return;
    };
    let Some(leg_sources) = rule.sources_for_label(label) else {
        return;
    };
    if leg_sources.contains(crate::kind::discard_transforms(source_kind)) {
        create_issue(
            context,
            rule.clone(),
            source_taint.clone(),
            sink_taint.clone(),
            &[source_kind.clone(), sink_kind.clone()],
            position,
            sink_index,
            callee,
            extra_features,
            new_model,
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn create_issue(
    context: &FlowCheckContext<'_>,
    rule: RuleRef,
    sources: Taint,
    sinks: Taint,
    involved_kinds: &[Kind],
    position: &Position,
    sink_index: usize,
    callee: &str,
    extra_features: &FeatureMayAlwaysSet,
    new_model: &mut Model,
) {
    // Issues are discovered on the un-overridden copy of the method.
    if context.method.parameter_type_overrides {
        return;
    }
    let mut features = extra_features.clone();
    features.add_always_set(
        &context
            .class_properties
            .issue_features(&context.method.id, involved_kinds),
    );
    new_model.add_issue(Issue {
        sources,
        sinks,
        rule,
        callee: callee.to_string(),
        sink_index,
        position: position.clone(),
        features,
    });
}
