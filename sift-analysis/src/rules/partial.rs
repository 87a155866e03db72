//! Per-call-site accumulator for multi-source rules.
//!
//! A multi-source rule fires only when both labeled legs are observed among
//! the sinks of one call. The state records fulfilled legs; when the
//! counterpart leg arrives, it returns the issue sink taint re-kinded onto
//! the triggered counterpart. The surviving state is stored on the
//! instruction so the backward analysis can materialize triggered sinks.

use sift_core::types::collections::FxHashMap;

use crate::domain::AbstractDomain;
use crate::feature::{FeatureMayAlwaysSet, FeatureSet};
use crate::kind::{Kind, KindData, KindFactory};
use crate::rules::RuleRef;
use crate::taint::Taint;

#[derive(Debug, Clone)]
struct FulfilledLeg {
    /// Combined source and sink features of the fulfilled leg.
    features: FeatureMayAlwaysSet,
    /// The sink taint of the fulfilled leg.
    sink: Taint,
}

/// Progress of multi-source rules across the sinks of one call.
#[derive(Debug, Clone, Default)]
pub struct FulfilledPartialKindState {
    fulfilled: FxHashMap<(i32, Kind), FulfilledLeg>,
}

impl FulfilledPartialKindState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fulfilled.is_empty()
    }

    /// Record that a source fulfilled `partial_sink` under `rule`.
    ///
    /// If the counterpart leg was already fulfilled in this state, returns
    /// the issue sink: this leg's sink taint re-kinded onto the triggered
    /// counterpart of `partial_sink`, carrying the counterpart leg's
    /// features. Otherwise records progress and returns `None`.
    pub fn fulfill_kind(
        &mut self,
        rule: &RuleRef,
        partial_sink: &Kind,
        source_features: FeatureMayAlwaysSet,
        sink: &Taint,
        kinds: &KindFactory,
    ) -> Option<Taint> {
        let KindData::Partial { name, label } = &**partial_sink else {
            return None;
        };
        let counterpart_label = rule.counterpart_label(label)?;
        let counterpart = kinds.partial_from_ids(*name, counterpart_label);

        let mut leg_features = source_features;
        leg_features.add_set(&sink.features_joined());

        if let Some(counterpart_leg) = self.fulfilled.get(&(rule.code, counterpart.clone())) {
            // Both legs observed: build the issue sink.
            let triggered = kinds.triggered(partial_sink, rule.code);
            let counterpart_features = counterpart_leg.features.clone();
            let issue_sink = sink.transform_kind_with_features(
                |kind| {
                    if kind == partial_sink {
                        vec![triggered.clone()]
                    } else {
                        vec![kind.clone()]
                    }
                },
                |_| FeatureSet::new(),
            );
            let mut issue_sink = issue_sink;
            issue_sink.add_locally_inferred_features(&counterpart_features);
            return Some(issue_sink);
        }

        self.fulfilled
            .entry((rule.code, partial_sink.clone()))
            .and_modify(|leg| {
                leg.features.join_with(&leg_features);
                leg.sink.join_with(sink);
            })
            .or_insert_with(|| FulfilledLeg {
                features: leg_features,
                sink: sink.clone(),
            });
        None
    }

    /// Triggered counterpart sinks for every fulfilled leg, for the backward
    /// analysis: observing leg `a` turns the method's `b`-labeled sinks into
    /// triggered sinks.
    pub fn triggered_counterparts(
        &self,
        rules: impl Fn(i32) -> Option<RuleRef>,
        kinds: &KindFactory,
    ) -> Vec<(Kind, Taint)> {
        let mut result = Vec::new();
        for ((rule_code, partial_sink), leg) in &self.fulfilled {
            let Some(rule) = rules(*rule_code) else {
                continue;
            };
            let KindData::Partial { name, label } = &**partial_sink else {
                continue;
            };
            let Some(counterpart_label) = rule.counterpart_label(label) else {
                continue;
            };
            let counterpart = kinds.partial_from_ids(*name, counterpart_label);
            let triggered = kinds.triggered(&counterpart, *rule_code);
            result.push((triggered, leg.sink.clone()));
        }
        result
    }
}
