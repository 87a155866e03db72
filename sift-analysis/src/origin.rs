//! Origins: where a taint frame was declared.

use sift_core::types::collections::BTreeSet;
use sift_core::types::interning::{Interned, Interner};
use sift_core::types::{FieldId, LiteralId, MethodId};

use crate::access_path::PortRef;
use crate::domain::AbstractDomain;
use crate::position::Position;

/// A canonical name for cross-repository trace export leaves.
///
/// Templates are instantiated at call-site propagation; an uninstantiable
/// template is dropped from the frame.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CanonicalName {
    /// A template such as `%programmatic_leaf_name%`.
    Template(LiteralId),
    /// An instantiated name.
    Instantiated(LiteralId),
}

impl CanonicalName {
    pub fn is_template(&self) -> bool {
        matches!(self, CanonicalName::Template(_))
    }
}

/// The data of an interned origin.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OriginData {
    /// Declared on a method port.
    Method { method: MethodId, port: PortRef },
    /// Declared on a field.
    Field { field: FieldId },
    /// A cross-repository leaf identified by a canonical name.
    Crtex { canonical_name: CanonicalName, port: PortRef },
    /// An exploitability origin: the call site that made a sink exploitable.
    Exploitability { callee: MethodId, position: Position },
}

/// Canonical handle to an origin.
pub type Origin = Interned<OriginData>;

/// Hash-consing factory for origins.
pub struct OriginFactory {
    inner: Interner<OriginData>,
}

impl OriginFactory {
    pub fn new() -> Self {
        Self {
            inner: Interner::new(),
        }
    }

    pub fn method(&self, method: MethodId, port: PortRef) -> Origin {
        self.inner.intern(OriginData::Method { method, port })
    }

    pub fn field(&self, field: FieldId) -> Origin {
        self.inner.intern(OriginData::Field { field })
    }

    pub fn crtex(&self, canonical_name: CanonicalName, port: PortRef) -> Origin {
        self.inner.intern(OriginData::Crtex {
            canonical_name,
            port,
        })
    }

    pub fn exploitability(&self, callee: MethodId, position: Position) -> Origin {
        self.inner
            .intern(OriginData::Exploitability { callee, position })
    }
}

impl Default for OriginFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of origins.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct OriginSet {
    set: BTreeSet<Origin>,
}

impl OriginSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(origin: Origin) -> Self {
        let mut set = BTreeSet::new();
        set.insert(origin);
        Self { set }
    }

    pub fn add(&mut self, origin: Origin) {
        self.set.insert(origin);
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Origin> {
        self.set.iter()
    }

    /// Exploitability origins in this set.
    pub fn exploitability_origins(&self) -> impl Iterator<Item = &Origin> {
        self.set
            .iter()
            .filter(|origin| matches!(&***origin, OriginData::Exploitability { .. }))
    }

    /// Whether any origin points at a port of the given method.
    pub fn contains_method(&self, method: &MethodId) -> bool {
        self.set.iter().any(|origin| match &**origin {
            OriginData::Method { method: origin_method, .. } => origin_method == method,
            _ => false,
        })
    }
}

impl FromIterator<Origin> for OriginSet {
    fn from_iter<I: IntoIterator<Item = Origin>>(iter: I) -> Self {
        Self {
            set: iter.into_iter().collect(),
        }
    }
}

impl AbstractDomain for OriginSet {
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        self.set.is_subset(&other.set)
    }

    fn join_with(&mut self, other: &Self) {
        self.set.extend(other.set.iter().cloned());
    }
}
