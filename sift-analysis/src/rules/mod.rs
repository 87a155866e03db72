//! Rules linking source kinds to sink kinds.
//!
//! Three rule shapes:
//! - **Simple**: any listed source kind reaching any listed sink kind.
//! - **Multi-source**: exactly two labeled source legs must reach the same
//!   partial sink before the rule fires.
//! - **Exploitability**: a transform-source leg turns a sink into a
//!   source-as-transform sink; a second source leg reaching that sink
//!   completes the rule.
//!
//! Rule parsing from persistent form is the driver's concern; this module
//! consumes already-decoded `RuleConfig` values.

pub mod matcher;
pub mod partial;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sift_core::errors::ModelError;
use sift_core::types::collections::{BTreeMap, BTreeSet, FxHashMap};
use sift_core::types::LabelId;
use tracing::warn;

use crate::factories::Factories;
use crate::kind::{discard_transforms, Kind, KindData};

/// The shape-specific data of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    Simple {
        sources: BTreeSet<Kind>,
        sinks: BTreeSet<Kind>,
    },
    MultiSource {
        /// Exactly two labels, each with its source kinds.
        multi_sources: BTreeMap<LabelId, BTreeSet<Kind>>,
        /// Partial sink kinds, one per (sink name, label).
        partial_sinks: BTreeSet<Kind>,
    },
    Exploitability {
        /// Source kinds completing the rule at the exploitable call site.
        sources: BTreeSet<Kind>,
        /// Source kinds applied as transforms over the sink.
        transform_sources: BTreeSet<Kind>,
        /// Sink kinds the rule watches.
        sinks: BTreeSet<Kind>,
    },
}

/// A rule, identified by its stable code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub code: i32,
    pub description: String,
    pub kind: RuleKind,
}

/// Shared handle to a rule.
pub type RuleRef = Arc<Rule>;

impl Rule {
    /// For a multi-source rule, the label opposite `label`.
    pub fn counterpart_label(&self, label: &LabelId) -> Option<LabelId> {
        match &self.kind {
            RuleKind::MultiSource { multi_sources, .. } => multi_sources
                .keys()
                .find(|candidate| *candidate != label)
                .copied(),
            _ => None,
        }
    }

    /// Source kinds of a multi-source leg.
    pub fn sources_for_label(&self, label: &LabelId) -> Option<&BTreeSet<Kind>> {
        match &self.kind {
            RuleKind::MultiSource { multi_sources, .. } => multi_sources.get(label),
            _ => None,
        }
    }
}

/// Decoded form of a rule, as provided by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub code: i32,
    #[serde(default)]
    pub description: String,
    /// Simple and exploitability rules.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub sinks: Vec<String>,
    /// Exploitability rules: sources applied as transforms over the sinks.
    #[serde(default)]
    pub transforms: Vec<String>,
    /// Multi-source rules: label to source kinds. Exactly two labels.
    #[serde(default)]
    pub multi_sources: BTreeMap<String, Vec<String>>,
    /// Multi-source rules: partial sink kind names.
    #[serde(default)]
    pub partial_sinks: Vec<String>,
}

impl Rule {
    /// Resolve a decoded rule against the kind factory.
    pub fn from_config(config: &RuleConfig, factories: &Factories) -> Result<Rule, ModelError> {
        let invalid = |reason: &str| ModelError::InvalidRule {
            name: config.name.clone(),
            reason: reason.to_string(),
        };
        let named = |names: &[String]| -> BTreeSet<Kind> {
            names.iter().map(|name| factories.kinds.named(name)).collect()
        };

        let kind = if !config.multi_sources.is_empty() {
            if config.multi_sources.len() != 2 {
                return Err(invalid("multi-source rules require exactly two labels"));
            }
            if config.partial_sinks.is_empty() {
                return Err(invalid("multi-source rules require partial sinks"));
            }
            let mut multi_sources = BTreeMap::new();
            let mut partial_sinks = BTreeSet::new();
            for (label, sources) in &config.multi_sources {
                if sources.is_empty() {
                    return Err(invalid("multi-source label with no source kinds"));
                }
                multi_sources.insert(factories.kinds.label(label), named(sources));
                for sink_name in &config.partial_sinks {
                    partial_sinks.insert(factories.kinds.partial(sink_name, label));
                }
            }
            RuleKind::MultiSource {
                multi_sources,
                partial_sinks,
            }
        } else if !config.transforms.is_empty() {
            if config.sources.is_empty() || config.sinks.is_empty() {
                return Err(invalid("exploitability rules require sources and sinks"));
            }
            RuleKind::Exploitability {
                sources: named(&config.sources),
                transform_sources: named(&config.transforms),
                sinks: named(&config.sinks),
            }
        } else {
            if config.sources.is_empty() || config.sinks.is_empty() {
                return Err(invalid("simple rules require sources and sinks"));
            }
            RuleKind::Simple {
                sources: named(&config.sources),
                sinks: named(&config.sinks),
            }
        };

        Ok(Rule {
            name: config.name.clone(),
            code: config.code,
            description: config.description.clone(),
            kind,
        })
    }
}

/// The rule set with its lookup indices.
#[derive(Default)]
pub struct Rules {
    rules: Vec<RuleRef>,
    by_code: FxHashMap<i32, RuleRef>,
    /// (source kind, sink kind) to simple rules.
    simple: FxHashMap<(Kind, Kind), Vec<RuleRef>>,
    /// (source kind, partial sink kind) to multi-source rules.
    partial: FxHashMap<(Kind, Kind), Vec<RuleRef>>,
    exploitability: Vec<RuleRef>,
}

impl Rules {
    /// Build the rule set. Invalid configs are logged and dropped, never
    /// fatal.
    pub fn from_configs(configs: &[RuleConfig], factories: &Factories) -> Rules {
        let mut rules = Vec::new();
        for config in configs {
            match Rule::from_config(config, factories) {
                Ok(rule) => rules.push(rule),
                Err(error) => {
                    warn!(target: "sift::rules", rule = %config.name, %error, "Dropping invalid rule");
                }
            }
        }
        Rules::new(rules)
    }

    pub fn new(rules: Vec<Rule>) -> Rules {
        let mut result = Rules::default();
        for rule in rules {
            let rule = Arc::new(rule);
            if result.by_code.contains_key(&rule.code) {
                warn!(target: "sift::rules", code = rule.code, "Dropping rule with duplicate code");
                continue;
            }
            result.by_code.insert(rule.code, rule.clone());
            match &rule.kind {
                RuleKind::Simple { sources, sinks } => {
                    for source in sources {
                        for sink in sinks {
                            result
                                .simple
                                .entry((source.clone(), sink.clone()))
                                .or_default()
                                .push(rule.clone());
                        }
                    }
                }
                RuleKind::MultiSource {
                    multi_sources,
                    partial_sinks,
                } => {
                    for (label, sources) in multi_sources {
                        for source in sources {
                            for partial_sink in partial_sinks {
                                let matches_label = match &**partial_sink {
                                    KindData::Partial {
                                        label: sink_label, ..
                                    } => sink_label == label,
                                    _ => false,
                                };
                                if matches_label {
                                    result
                                        .partial
                                        .entry((source.clone(), partial_sink.clone()))
                                        .or_default()
                                        .push(rule.clone());
                                }
                            }
                        }
                    }
                }
                RuleKind::Exploitability { .. } => {
                    result.exploitability.push(rule.clone());
                }
            }
            result.rules.push(rule);
        }
        result
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleRef> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_by_code(&self, code: i32) -> Option<&RuleRef> {
        self.by_code.get(&code)
    }

    /// Simple rules relating a source kind to a sink kind. Transform kinds
    /// match through their base kind.
    pub fn rules_for(&self, source: &Kind, sink: &Kind) -> &[RuleRef] {
        self.simple
            .get(&(
                discard_transforms(source).clone(),
                discard_transforms(sink).clone(),
            ))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Multi-source rules relating a source kind to a partial sink kind.
    pub fn partial_rules_for(&self, source: &Kind, partial_sink: &Kind) -> &[RuleRef] {
        self.partial
            .get(&(discard_transforms(source).clone(), partial_sink.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Exploitability rules for which `source` reaching `sink` creates the
    /// source-as-transform sink (the partially-fulfilled leg).
    pub fn exploitability_partial_for(&self, source: &Kind, sink: &Kind) -> Vec<RuleRef> {
        let source = discard_transforms(source);
        let sink = discard_transforms(sink);
        self.exploitability
            .iter()
            .filter(|rule| match &rule.kind {
                RuleKind::Exploitability {
                    transform_sources,
                    sinks,
                    ..
                } => transform_sources.contains(source) && sinks.contains(sink),
                _ => false,
            })
            .cloned()
            .collect()
    }

    /// Exploitability rules fulfilled by `source` reaching a sink that
    /// already embeds a source-as-transform.
    pub fn exploitability_fulfilled_for(
        &self,
        source: &Kind,
        sink_transform: &Kind,
    ) -> Vec<RuleRef> {
        let Some(embedded) = sink_transform.source_as_transform().cloned() else {
            return Vec::new();
        };
        let base = discard_transforms(sink_transform);
        let source = discard_transforms(source);
        self.exploitability
            .iter()
            .filter(|rule| match &rule.kind {
                RuleKind::Exploitability {
                    sources,
                    transform_sources,
                    sinks,
                } => {
                    sources.contains(source)
                        && transform_sources.contains(discard_transforms(&embedded))
                        && sinks.contains(base)
                }
                _ => false,
            })
            .cloned()
            .collect()
    }
}
