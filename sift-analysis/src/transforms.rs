//! Transform sequences and the propagation transform engine.
//!
//! A transform is either a named reshaping step or a source kind embedded as
//! a transform over a sink (the signal driving exploitability rules).
//! Sequences are interned; concatenation past the configured length cap is
//! refused and drops the frame (a broadening event, not an error).

use sift_core::config::Heuristics;
use sift_core::types::interning::{Interned, Interner, SymbolInterner};
use sift_core::types::TransformNameId;

use crate::factories::Factories;
use crate::feature::FeatureSet;
use crate::kind::{Kind, KindData};
use crate::taint::Taint;

/// One transform step.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Transform {
    /// A named transform applied to the taint.
    Named(TransformNameId),
    /// A source kind applied as a transform over a sink.
    SourceAsTransform(Kind),
}

/// An ordered sequence of transforms.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransformListData {
    parts: Vec<Transform>,
}

impl TransformListData {
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transform> {
        self.parts.iter()
    }

    /// Whether the sequence embeds a source over a sink.
    pub fn has_source_as_transform(&self) -> bool {
        self.parts
            .iter()
            .any(|transform| matches!(transform, Transform::SourceAsTransform(_)))
    }

    /// The first embedded source kind, if any.
    pub fn source_as_transform(&self) -> Option<&Kind> {
        self.parts.iter().find_map(|transform| match transform {
            Transform::SourceAsTransform(kind) => Some(kind),
            Transform::Named(_) => None,
        })
    }
}

/// Canonical handle to a transform sequence.
pub type TransformList = Interned<TransformListData>;

/// Interning factory for transforms and transform sequences.
pub struct TransformFactory {
    names: SymbolInterner,
    lists: Interner<TransformListData>,
    empty: TransformList,
}

impl TransformFactory {
    pub fn new() -> Self {
        let lists = Interner::new();
        let empty = lists.intern(TransformListData::default());
        Self {
            names: SymbolInterner::new(),
            lists,
            empty,
        }
    }

    /// Intern a named transform.
    pub fn named(&self, name: &str) -> Transform {
        Transform::Named(TransformNameId::new(self.names.intern(name)))
    }

    /// A source kind applied as a transform over a sink.
    pub fn source_as_transform(&self, source: Kind) -> Transform {
        Transform::SourceAsTransform(source)
    }

    /// Intern a sequence.
    pub fn list(&self, parts: Vec<Transform>) -> TransformList {
        self.lists.intern(TransformListData { parts })
    }

    /// The empty sequence.
    pub fn empty(&self) -> TransformList {
        self.empty.clone()
    }

    /// Concatenate two sequences, refusing combinations longer than the cap.
    pub fn concat(
        &self,
        lead: &TransformList,
        tail: &TransformList,
        max_length: usize,
    ) -> Option<TransformList> {
        if lead.len() + tail.len() > max_length {
            return None;
        }
        Some(self.concat_unbounded(lead, tail))
    }

    /// Concatenate two sequences without a length check. Used when
    /// flattening already-accepted kinds.
    pub fn concat_unbounded(&self, lead: &TransformList, tail: &TransformList) -> TransformList {
        if lead.is_empty() {
            return tail.clone();
        }
        if tail.is_empty() {
            return lead.clone();
        }
        let parts = lead.iter().chain(tail.iter()).cloned().collect();
        self.lists.intern(TransformListData { parts })
    }

    /// Resolve a transform name.
    pub fn resolve_name(&self, name: &TransformNameId) -> &str {
        self.names.resolve(&name.inner())
    }
}

impl Default for TransformFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Direction a propagation is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformDirection {
    /// Taint flows with the propagation: its local transforms are applied
    /// first, before the frame's own.
    Forward,
    /// Taint flows against the propagation (backward analysis): its local
    /// transforms are applied after the frame's own.
    Backward,
}

/// Apply a propagation frame's transform sequences to the taint flowing
/// through it.
///
/// Every frame of `input` is re-kinded onto a transform kind combining the
/// propagation's sequences with the frame's own; frames whose combined
/// sequence exceeds the configured cap are dropped. Propagations without
/// transforms return the input unchanged.
pub fn apply_propagation(
    factories: &Factories,
    heuristics: &Heuristics,
    propagation_kind: &Kind,
    input: &Taint,
    direction: TransformDirection,
) -> Taint {
    debug_assert!(
        propagation_kind.propagation_output().is_some(),
        "propagation frames must carry a propagation kind"
    );

    let (propagation_local, propagation_global) = match propagation_kind.transform_lists() {
        Some((local, global)) => (local.clone(), global.clone()),
        None => return input.clone(),
    };
    if propagation_local.is_empty() && propagation_global.is_empty() {
        return input.clone();
    }

    let max_length = heuristics.effective_max_transform_length();
    let transforms = &factories.transforms;

    input.transform_kind_with_features(
        |kind| {
            let (base, frame_local, frame_global) = match &**kind {
                KindData::Transform {
                    base,
                    local,
                    global,
                } => (base.clone(), local.clone(), global.clone()),
                _ => (kind.clone(), transforms.empty(), transforms.empty()),
            };

            let local = match direction {
                TransformDirection::Forward => {
                    transforms.concat(&propagation_local, &frame_local, max_length)
                }
                TransformDirection::Backward => {
                    transforms.concat(&frame_local, &propagation_local, max_length)
                }
            };
            let global = transforms.concat(&frame_global, &propagation_global, max_length);

            match (local, global) {
                (Some(local), Some(global)) => {
                    vec![factories.kinds.transform(base, local, global, transforms)]
                }
                // Refused by the length cap: drop the frame.
                _ => Vec::new(),
            }
        },
        |_| FeatureSet::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_interning() {
        let factory = TransformFactory::new();
        let first = factory.list(vec![factory.named("escape")]);
        let second = factory.list(vec![factory.named("escape")]);
        assert_eq!(first, second);
        assert!(factory.empty().is_empty());
    }

    #[test]
    fn test_concat_respects_cap() {
        let factory = TransformFactory::new();
        let pair = factory.list(vec![factory.named("a"), factory.named("b")]);
        assert!(factory.concat(&pair, &pair, 3).is_none());
        let joined = factory.concat(&pair, &pair, 4).unwrap();
        assert_eq!(joined.len(), 4);
    }

    #[test]
    fn test_concat_with_empty_is_identity() {
        let factory = TransformFactory::new();
        let single = factory.list(vec![factory.named("a")]);
        assert_eq!(factory.concat_unbounded(&factory.empty(), &single), single);
        assert_eq!(factory.concat_unbounded(&single, &factory.empty()), single);
    }

    #[test]
    fn test_source_as_transform_detection() {
        let transforms = TransformFactory::new();
        let kinds = crate::kind::KindFactory::new();
        let source = kinds.named("Source");
        let list = transforms.list(vec![
            transforms.named("wrap"),
            transforms.source_as_transform(source.clone()),
        ]);
        assert!(list.has_source_as_transform());
        assert_eq!(list.source_as_transform(), Some(&source));
    }
}
