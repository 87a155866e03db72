//! Kinds: interned categories of taint.
//!
//! Kind-specific behavior dispatches on the variant tag; there is no
//! inheritance hierarchy. Kind equality is pointer equality through the
//! factory; ordering compares the underlying data for deterministic
//! iteration.

use sift_core::types::interning::{Interned, Interner, SymbolInterner};
use sift_core::types::{KindNameId, LabelId};

use crate::transforms::{TransformFactory, TransformList};

/// Where a propagation writes its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropagationOutput {
    /// Taint leaves through the return value.
    Return,
    /// Taint leaves through (is written into) the given argument.
    Argument(u8),
}

/// The data of an interned kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KindData {
    /// A plain named kind (e.g. `TestSource`).
    Named { name: KindNameId },
    /// One leg of a multi-source rule: a named partial sink plus its label.
    Partial { name: KindNameId, label: LabelId },
    /// A partial sink whose counterpart leg was already fulfilled; carries
    /// the fulfilling rule.
    TriggeredPartial { partial: Kind, rule_code: i32 },
    /// A base kind plus ordered local transforms (applied in the current
    /// method) and global transforms (applied before).
    Transform {
        base: Kind,
        local: TransformList,
        global: TransformList,
    },
    /// Local propagation: taint entering here leaves through the output.
    /// Used only inside propagation frames.
    Propagation(PropagationOutput),
    /// Tracks data flowing from parameters.
    ArtificialSource,
}

impl KindData {
    pub fn is_partial(&self) -> bool {
        matches!(self, KindData::Partial { .. })
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self, KindData::TriggeredPartial { .. })
    }

    pub fn is_transform(&self) -> bool {
        matches!(self, KindData::Transform { .. })
    }

    pub fn is_propagation(&self) -> bool {
        matches!(self, KindData::Propagation(_))
    }

    pub fn is_artificial_source(&self) -> bool {
        matches!(self, KindData::ArtificialSource)
    }

    /// The base kind under transforms, if this is a transform kind.
    pub fn transform_base(&self) -> Option<&Kind> {
        match self {
            KindData::Transform { base, .. } => Some(base),
            _ => None,
        }
    }

    /// The local/global transform lists, if this is a transform kind.
    pub fn transform_lists(&self) -> Option<(&TransformList, &TransformList)> {
        match self {
            KindData::Transform { local, global, .. } => Some((local, global)),
            _ => None,
        }
    }

    /// Whether any transform in the sequences embeds a source over a sink.
    pub fn has_source_as_transform(&self) -> bool {
        match self {
            KindData::Transform { local, global, .. } => {
                local.has_source_as_transform() || global.has_source_as_transform()
            }
            _ => false,
        }
    }

    /// The source kind embedded as the innermost source-as-transform, if any.
    pub fn source_as_transform(&self) -> Option<&Kind> {
        match self {
            KindData::Transform { local, global, .. } => local
                .source_as_transform()
                .or_else(|| global.source_as_transform()),
            _ => None,
        }
    }

    /// The propagation output, if this is a propagation kind (possibly under
    /// transforms).
    pub fn propagation_output(&self) -> Option<PropagationOutput> {
        match self {
            KindData::Propagation(output) => Some(*output),
            KindData::Transform { base, .. } => base.propagation_output(),
            _ => None,
        }
    }
}

/// Canonical handle to a kind.
pub type Kind = Interned<KindData>;

/// Interning factory for kinds.
pub struct KindFactory {
    names: SymbolInterner,
    inner: Interner<KindData>,
    artificial_source: Kind,
    local_return: Kind,
}

impl KindFactory {
    pub fn new() -> Self {
        let inner = Interner::new();
        let artificial_source = inner.intern(KindData::ArtificialSource);
        let local_return = inner.intern(KindData::Propagation(PropagationOutput::Return));
        Self {
            names: SymbolInterner::new(),
            inner,
            artificial_source,
            local_return,
        }
    }

    /// Intern a named kind.
    pub fn named(&self, name: &str) -> Kind {
        let name = KindNameId::new(self.names.intern(name));
        self.inner.intern(KindData::Named { name })
    }

    /// Intern a partial kind: one leg of a multi-source rule.
    pub fn partial(&self, name: &str, label: &str) -> Kind {
        let name = KindNameId::new(self.names.intern(name));
        let label = self.label(label);
        self.inner.intern(KindData::Partial { name, label })
    }

    /// Intern a multi-source rule label.
    pub fn label(&self, label: &str) -> LabelId {
        LabelId::new(self.names.intern(label))
    }

    /// Intern a partial kind from already-interned name and label.
    pub fn partial_from_ids(&self, name: KindNameId, label: LabelId) -> Kind {
        self.inner.intern(KindData::Partial { name, label })
    }

    /// Intern the triggered counterpart of a partial kind.
    pub fn triggered(&self, partial: &Kind, rule_code: i32) -> Kind {
        debug_assert!(partial.is_partial(), "triggered kind requires a partial kind");
        self.inner.intern(KindData::TriggeredPartial {
            partial: partial.clone(),
            rule_code,
        })
    }

    /// Intern a transform kind. Nested transform bases are flattened so the
    /// base of a transform kind is never itself a transform kind; empty
    /// transform lists normalize back to the base.
    pub fn transform(
        &self,
        base: Kind,
        local: TransformList,
        global: TransformList,
        transforms: &TransformFactory,
    ) -> Kind {
        let (base, local, global) = match &*base {
            KindData::Transform {
                base: inner_base,
                local: inner_local,
                global: inner_global,
            } => {
                let local = transforms.concat_unbounded(&local, inner_local);
                let global = transforms.concat_unbounded(inner_global, &global);
                (inner_base.clone(), local, global)
            }
            _ => (base.clone(), local, global),
        };
        if local.is_empty() && global.is_empty() {
            return base;
        }
        self.inner.intern(KindData::Transform {
            base,
            local,
            global,
        })
    }

    /// The local-return propagation kind.
    pub fn local_return(&self) -> Kind {
        self.local_return.clone()
    }

    /// The local-argument propagation kind.
    pub fn local_argument(&self, index: u8) -> Kind {
        self.inner
            .intern(KindData::Propagation(PropagationOutput::Argument(index)))
    }

    /// The artificial source kind.
    pub fn artificial_source(&self) -> Kind {
        self.artificial_source.clone()
    }

    /// Resolve a kind name.
    pub fn resolve_name(&self, name: &KindNameId) -> &str {
        self.names.resolve(&name.inner())
    }

    /// Resolve a rule label.
    pub fn resolve_label(&self, label: &LabelId) -> &str {
        self.names.resolve(&label.inner())
    }
}

impl Default for KindFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// The base kind with all transforms discarded. Rules match transform kinds
/// through their base.
pub fn discard_transforms(kind: &Kind) -> &Kind {
    match &**kind {
        KindData::Transform { base, .. } => base,
        _ => kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_interning_pointer_equality() {
        let factory = KindFactory::new();
        assert_eq!(factory.named("Source"), factory.named("Source"));
        assert_ne!(factory.named("Source"), factory.named("Sink"));
        assert_ne!(
            factory.partial("Sink", "a"),
            factory.partial("Sink", "b")
        );
    }

    #[test]
    fn test_triggered_wraps_partial() {
        let factory = KindFactory::new();
        let partial = factory.partial("Sink", "a");
        let triggered = factory.triggered(&partial, 7);
        assert!(triggered.is_triggered());
        match &*triggered {
            KindData::TriggeredPartial { partial: inner, rule_code } => {
                assert_eq!(inner, &partial);
                assert_eq!(*rule_code, 7);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_transform_normalizes_empty_lists() {
        let kinds = KindFactory::new();
        let transforms = TransformFactory::new();
        let base = kinds.named("Sink");
        let normalized =
            kinds.transform(base.clone(), transforms.empty(), transforms.empty(), &transforms);
        assert_eq!(normalized, base);
    }

    #[test]
    fn test_transform_flattens_nested_base() {
        let kinds = KindFactory::new();
        let transforms = TransformFactory::new();
        let base = kinds.named("Sink");
        let sanitize = transforms.list(vec![transforms.named("sanitize")]);
        let encode = transforms.list(vec![transforms.named("encode")]);

        let inner = kinds.transform(base.clone(), sanitize, transforms.empty(), &transforms);
        let outer = kinds.transform(inner, encode, transforms.empty(), &transforms);

        let (local, _global) = outer.transform_lists().unwrap();
        assert_eq!(local.len(), 2);
        assert_eq!(outer.transform_base().unwrap(), &base);
    }
}
