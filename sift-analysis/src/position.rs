//! Source positions and bounded local-position sets.

use sift_core::types::collections::BTreeSet;
use sift_core::types::interning::{Interned, Interner};
use sift_core::types::FileId;

use crate::domain::AbstractDomain;

/// An interned source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionData {
    pub file: Option<FileId>,
    pub line: i32,
    pub start: i32,
    pub end: i32,
}

/// Canonical handle to a position.
pub type Position = Interned<PositionData>;

/// Line value of the unknown position.
pub const UNKNOWN_LINE: i32 = -1;

/// Hash-consing factory for positions.
pub struct PositionFactory {
    inner: Interner<PositionData>,
    unknown: Position,
}

impl PositionFactory {
    pub fn new() -> Self {
        let inner = Interner::new();
        let unknown = inner.intern(PositionData {
            file: None,
            line: UNKNOWN_LINE,
            start: UNKNOWN_LINE,
            end: UNKNOWN_LINE,
        });
        Self { inner, unknown }
    }

    /// Canonicalize a position.
    pub fn get(&self, data: PositionData) -> Position {
        self.inner.intern(data)
    }

    /// A position with only a line number.
    pub fn get_line(&self, line: i32) -> Position {
        self.get(PositionData {
            file: None,
            line,
            start: UNKNOWN_LINE,
            end: UNKNOWN_LINE,
        })
    }

    /// The unknown position.
    pub fn unknown(&self) -> Position {
        self.unknown.clone()
    }
}

impl Default for PositionFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// A bounded set of positions local to the current method.
///
/// Widens to `Top` once the configured cap is exceeded; `Top` stays `Top`
/// under join and absorbs every set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocalPositionSet {
    /// No local positions recorded.
    #[default]
    Bottom,
    /// An explicit set of positions.
    Set(BTreeSet<Position>),
    /// Too many positions; the set was widened away.
    Top,
}

impl LocalPositionSet {
    /// A singleton set.
    pub fn singleton(position: Position) -> Self {
        let mut set = BTreeSet::new();
        set.insert(position);
        LocalPositionSet::Set(set)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, LocalPositionSet::Top)
    }

    /// Add a position, widening to `Top` past `max_positions`.
    pub fn add(&mut self, position: Position, max_positions: usize) {
        match self {
            LocalPositionSet::Bottom => *self = LocalPositionSet::singleton(position),
            LocalPositionSet::Set(set) => {
                set.insert(position);
                if set.len() > max_positions {
                    *self = LocalPositionSet::Top;
                }
            }
            LocalPositionSet::Top => {}
        }
    }

    /// Positions in the set; empty for `Bottom` and `Top`.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        match self {
            LocalPositionSet::Set(set) => Some(set.iter()),
            _ => None,
        }
        .into_iter()
        .flatten()
    }
}

impl AbstractDomain for LocalPositionSet {
    fn bottom() -> Self {
        LocalPositionSet::Bottom
    }

    fn is_bottom(&self) -> bool {
        matches!(self, LocalPositionSet::Bottom)
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (LocalPositionSet::Bottom, _) => true,
            (_, LocalPositionSet::Top) => true,
            (LocalPositionSet::Top, _) => false,
            (_, LocalPositionSet::Bottom) => false,
            (LocalPositionSet::Set(left), LocalPositionSet::Set(right)) => left.is_subset(right),
        }
    }

    fn join_with(&mut self, other: &Self) {
        if other.is_bottom() || self.is_top() {
            return;
        }
        if other.is_top() {
            *self = LocalPositionSet::Top;
            return;
        }
        if self.is_bottom() {
            *self = other.clone();
            return;
        }
        if let (LocalPositionSet::Set(left), LocalPositionSet::Set(right)) = (&mut *self, other) {
            left.extend(right.iter().cloned());
        }
    }
}
