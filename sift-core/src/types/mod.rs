//! Data structures and interning for Sift.
//! FxHashMap, SmallVec, lasso-based symbol interning, hash-consed values,
//! Spur-based ID types.

pub mod collections;
pub mod identifiers;
pub mod interning;

pub use collections::{FxHashMap, FxHashSet};
pub use identifiers::{
    FeatureId, FieldId, FileId, KindNameId, LabelId, LiteralId, MethodId, ModelGeneratorId,
    TransformNameId, TypeId,
};
pub use interning::{Interned, Interner, SymbolInterner};
