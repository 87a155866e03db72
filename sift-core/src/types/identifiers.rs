//! Spur-based ID types for type-safe interned identifiers.
//!
//! Each ID type wraps a `lasso::Spur` to prevent cross-type confusion.
//! A `MethodId` cannot be accidentally used where a `FieldId` is expected.
//! IDs order by their interner index, which is stable for a fixed interning
//! order; output-facing code sorts by resolved name instead.

use lasso::{Key, Spur};
use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Spur);

        impl $name {
            /// Create a new ID from a `Spur`.
            pub fn new(spur: Spur) -> Self {
                Self(spur)
            }

            /// Get the inner `Spur`.
            pub fn inner(self) -> Spur {
                self.0
            }

            /// The interner index backing this ID.
            pub fn index(self) -> usize {
                self.0.into_usize()
            }
        }

        impl From<Spur> for $name {
            fn from(spur: Spur) -> Self {
                Self(spur)
            }
        }

        impl From<$name> for Spur {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                self.index().cmp(&other.index())
            }
        }
    };
}

define_id!(
    /// Interned method signature identifier.
    MethodId
);

define_id!(
    /// Interned field name identifier.
    FieldId
);

define_id!(
    /// Interned type name identifier.
    TypeId
);

define_id!(
    /// Interned string literal identifier (also used for literal path indices).
    LiteralId
);

define_id!(
    /// Interned source file path identifier.
    FileId
);

define_id!(
    /// Interned feature name identifier.
    FeatureId
);

define_id!(
    /// Interned kind name identifier.
    KindNameId
);

define_id!(
    /// Interned multi-source rule label identifier.
    LabelId
);

define_id!(
    /// Interned transform name identifier.
    TransformNameId
);

define_id!(
    /// Interned model generator name identifier.
    ModelGeneratorId
);
