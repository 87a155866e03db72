//! The forward environment: memory location to taint tree.
//!
//! Memory locations are opaque tokens minted by the aliasing oracle. Missing
//! keys are bottom. Writes over a set of locations are strong only when the
//! set is a singleton; aliased locations can only be written weakly.

use sift_core::types::collections::{BTreeSet, FxHashMap};

use crate::access_path::Path;
use crate::domain::AbstractDomain;
use crate::taint::{Taint, TaintTree};
use crate::tree::UpdateKind;

/// An opaque memory location token from the aliasing oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoryLocation(pub u32);

impl std::fmt::Display for MemoryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mem#{}", self.0)
    }
}

/// A set of memory locations a register may point to.
pub type MemoryLocationSet = BTreeSet<MemoryLocation>;

/// The per-program-point abstract state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaintEnvironment {
    map: FxHashMap<MemoryLocation, TaintTree>,
}

impl TaintEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// The taint tree at a location; bottom when absent.
    pub fn read(&self, location: MemoryLocation) -> TaintTree {
        self.map.get(&location).cloned().unwrap_or_else(TaintTree::bottom)
    }

    /// The taint tree at a path under a location.
    pub fn read_path(&self, location: MemoryLocation, path: &Path) -> TaintTree {
        self.map
            .get(&location)
            .map(|tree| tree.read(path))
            .unwrap_or_else(TaintTree::bottom)
    }

    /// Join of the trees at every location in the set.
    pub fn read_set(&self, locations: &MemoryLocationSet, path: &Path) -> TaintTree {
        let mut result = TaintTree::bottom();
        for location in locations {
            result.join_with(&self.read_path(*location, path));
        }
        result
    }

    /// Write a whole tree at a location.
    pub fn write_tree(
        &mut self,
        location: MemoryLocation,
        path: &Path,
        tree: TaintTree,
        kind: UpdateKind,
    ) {
        let entry = self.map.entry(location).or_insert_with(TaintTree::bottom);
        entry.write(path, tree, kind);
        if entry.is_bottom() {
            self.map.remove(&location);
        }
    }

    /// Write a taint value at a location.
    pub fn write(
        &mut self,
        location: MemoryLocation,
        path: &Path,
        taint: Taint,
        kind: UpdateKind,
    ) {
        self.write_tree(location, path, TaintTree::leaf(taint), kind);
    }

    /// Write a taint value over a set of locations. The write is strong only
    /// when the requested kind is strong and the set is a singleton.
    pub fn write_set(
        &mut self,
        locations: &MemoryLocationSet,
        path: &Path,
        taint: &Taint,
        kind: UpdateKind,
    ) {
        let effective = if locations.len() == 1 {
            kind
        } else {
            UpdateKind::Weak
        };
        for location in locations {
            self.write(*location, path, taint.clone(), effective);
        }
    }

    /// Write a whole tree over a set of locations, weakening on aliasing.
    pub fn write_tree_set(
        &mut self,
        locations: &MemoryLocationSet,
        path: &Path,
        tree: &TaintTree,
        kind: UpdateKind,
    ) {
        let effective = if locations.len() == 1 {
            kind
        } else {
            UpdateKind::Weak
        };
        for location in locations {
            self.write_tree(*location, path, tree.clone(), effective);
        }
    }

    /// Locations with non-bottom taint.
    pub fn iter(&self) -> impl Iterator<Item = (&MemoryLocation, &TaintTree)> {
        self.map.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl AbstractDomain for TaintEnvironment {
    fn bottom() -> Self {
        Self::new()
    }

    fn is_bottom(&self) -> bool {
        self.map.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        self.map.iter().all(|(location, tree)| {
            other
                .map
                .get(location)
                .map(|other_tree| tree.leq(other_tree))
                .unwrap_or_else(|| tree.is_bottom())
        })
    }

    fn join_with(&mut self, other: &Self) {
        for (location, other_tree) in &other.map {
            match self.map.get_mut(location) {
                Some(tree) => tree.join_with(other_tree),
                None => {
                    self.map.insert(*location, other_tree.clone());
                }
            }
        }
    }
}
