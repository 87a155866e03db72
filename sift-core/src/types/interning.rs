//! Interning for symbols and structured values.
//!
//! Symbols (method signatures, field names, feature names) intern through
//! `lasso::ThreadedRodeo`, which is safe for concurrent use by a parallel
//! driver. Structured values (kind data, positions, access paths, origins,
//! transform lists) hash-cons through the generic `Interner<T>`, which hands
//! out `Interned<T>` handles that compare by pointer and order by value.
//!
//! Factories are built once by the driver and passed by reference into every
//! analysis context; there is no global mutable state.

use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use lasso::{RodeoReader, Spur, ThreadedRodeo};
use rustc_hash::FxHashMap;

/// Thread-safe string interner handing out `Spur` keys.
pub struct SymbolInterner {
    inner: ThreadedRodeo,
}

impl SymbolInterner {
    /// Create a new symbol interner.
    pub fn new() -> Self {
        Self {
            inner: ThreadedRodeo::default(),
        }
    }

    /// Intern a symbol.
    pub fn intern(&self, name: &str) -> Spur {
        self.inner.get_or_intern(name)
    }

    /// Intern a qualified name (`Holder.member`).
    pub fn intern_qualified(&self, holder: &str, member: &str) -> Spur {
        let qualified = format!("{}.{}", holder, member);
        self.inner.get_or_intern(&qualified)
    }

    /// Look up a previously interned symbol without inserting.
    pub fn get(&self, name: &str) -> Option<Spur> {
        self.inner.get(name)
    }

    /// Resolve a `Spur` back to its string.
    pub fn resolve(&self, key: &Spur) -> &str {
        self.inner.resolve(key)
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the interner is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Freeze the interner into a read-only `RodeoReader`.
    pub fn into_reader(self) -> RodeoReader {
        self.inner.into_reader()
    }
}

impl Default for SymbolInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// A hash-consed handle to a value of type `T`.
///
/// Two handles from the same `Interner` are equal iff they point to the same
/// allocation; equality and hashing are pointer-based. Ordering compares the
/// underlying values, which is consistent with pointer equality because the
/// interner never stores two equal values.
pub struct Interned<T>(Arc<T>);

impl<T> Interned<T> {
    fn new(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Address of the interned allocation, usable as a process-local token.
    pub fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl<T> Clone for Interned<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Interned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> AsRef<T> for Interned<T> {
    fn as_ref(&self) -> &T {
        &self.0
    }
}

impl<T> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Eq for Interned<T> {}

impl<T> Hash for Interned<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl<T: Ord> PartialOrd for Interned<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Ord> Ord for Interned<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if Arc::ptr_eq(&self.0, &other.0) {
            return std::cmp::Ordering::Equal;
        }
        self.0.as_ref().cmp(other.0.as_ref())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Interned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Hash-consing interner for structured values.
///
/// Lookups of existing values and creation of new ones both take the internal
/// lock; handles returned from `intern` stay valid for the life of the
/// interner and compare by pointer.
pub struct Interner<T> {
    map: Mutex<FxHashMap<T, Interned<T>>>,
}

impl<T: Clone + Eq + Hash> Interner<T> {
    /// Create a new empty interner.
    pub fn new() -> Self {
        Self {
            map: Mutex::new(FxHashMap::default()),
        }
    }

    /// Intern a value, returning the canonical handle.
    pub fn intern(&self, value: T) -> Interned<T> {
        let mut map = self.map.lock().expect("interner lock poisoned");
        if let Some(existing) = map.get(&value) {
            return existing.clone();
        }
        let handle = Interned::new(value.clone());
        map.insert(value, handle.clone());
        handle
    }

    /// Number of interned values.
    pub fn len(&self) -> usize {
        self.map.lock().expect("interner lock poisoned").len()
    }

    /// Whether the interner is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Eq + Hash> Default for Interner<T> {
    fn default() -> Self {
        Self::new()
    }
}
