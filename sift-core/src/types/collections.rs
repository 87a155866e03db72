//! Re-exports of performance-oriented collection types.

pub use rustc_hash::{FxHashMap, FxHashSet};
pub use smallvec::SmallVec;
pub use std::collections::{BTreeMap, BTreeSet};

/// SmallVec optimized for access-path elements (usually <4).
pub type SmallVec4<T> = SmallVec<[T; 4]>;

/// SmallVec optimized for frame sets within one bucket (usually <8).
pub type SmallVec8<T> = SmallVec<[T; 8]>;

/// SmallVec optimized for via-port lists (usually <2).
pub type SmallVec2<T> = SmallVec<[T; 2]>;
