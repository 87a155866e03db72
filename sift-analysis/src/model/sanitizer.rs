//! Sanitizers: model-level suppression of taint kinds.

use sift_core::types::collections::BTreeSet;

use crate::kind::Kind;

/// What a sanitizer suppresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SanitizerKind {
    Sources,
    Sinks,
    Propagations,
}

/// Which kinds a sanitizer applies to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SanitizedKinds {
    /// Every kind.
    All,
    /// Only the listed kinds.
    Specific(BTreeSet<Kind>),
}

/// A sanitizer entry on a model. Global sanitizers apply to every port; port
/// sanitizers apply to one root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sanitizer {
    pub sanitize: SanitizerKind,
    pub kinds: SanitizedKinds,
}

impl Sanitizer {
    pub fn new(sanitize: SanitizerKind, kinds: SanitizedKinds) -> Self {
        Self { sanitize, kinds }
    }

    /// Whether this sanitizer suppresses `kind` in the given role.
    pub fn sanitizes(&self, kind: &Kind, role: SanitizerKind) -> bool {
        if self.sanitize != role {
            return false;
        }
        match &self.kinds {
            SanitizedKinds::All => true,
            SanitizedKinds::Specific(kinds) => {
                kinds.contains(crate::kind::discard_transforms(kind))
            }
        }
    }
}
