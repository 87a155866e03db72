//! Path trees: finite maps from paths to a joinable value domain.
//!
//! A `PathTree<V>` node holds a value and a finite mapping from path elements
//! to subtrees, with two structural invariants:
//! - **Subsumption**: a node's value holds nothing already covered by any
//!   ancestor's value. Writes and joins subtract the ancestor accumulator
//!   from descendants, so `leq` reduces to child-wise comparison.
//! - **Any-index background**: the `[*]` child is the background for every
//!   literal-index sibling. Writing `[*]` also weakly writes every existing
//!   literal index; a first write to a new literal index inherits the `[*]`
//!   subtree.
//!
//! Trees are height- and leaf-bounded by the caller through
//! `collapse_deeper_than` and `limit_leaves`; both fold values upward and
//! pass them through a caller-supplied transform that records the precision
//! loss (a broadening feature).

use sift_core::types::collections::BTreeMap;

use crate::access_path::{AccessPath, Path, PathElement, Root};
use crate::domain::{AbstractDomain, TreeValue};

/// Whether a write replaces or joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Overwrite the node and delete all of its descendants.
    Strong,
    /// Join into the node, keeping descendants that are not subsumed.
    Weak,
}

/// A tree of values indexed by paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTree<V: TreeValue> {
    value: V,
    children: BTreeMap<PathElement, PathTree<V>>,
}

impl<V: TreeValue> Default for PathTree<V> {
    fn default() -> Self {
        Self::bottom()
    }
}

impl<V: TreeValue> PathTree<V> {
    /// A tree holding a single value at the root.
    pub fn leaf(value: V) -> Self {
        Self {
            value,
            children: BTreeMap::new(),
        }
    }

    /// The root value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The immediate children.
    pub fn successors(&self) -> impl Iterator<Item = (&PathElement, &PathTree<V>)> {
        self.children.iter()
    }

    /// The child at `element`, or bottom.
    pub fn successor(&self, element: &PathElement) -> PathTree<V> {
        self.children.get(element).cloned().unwrap_or_else(Self::bottom)
    }

    /// Number of leaf nodes (nodes with no children). Bottom has zero leaves.
    pub fn leaf_count(&self) -> usize {
        if self.is_bottom() {
            return 0;
        }
        self.leaf_count_inner()
    }

    fn leaf_count_inner(&self) -> usize {
        if self.children.is_empty() {
            return 1;
        }
        self.children.values().map(PathTree::leaf_count_inner).sum()
    }

    /// Height of the tree: 0 for a single node.
    pub fn height(&self) -> usize {
        self.children
            .values()
            .map(|child| 1 + child.height())
            .max()
            .unwrap_or(0)
    }

    /// All non-bottom values with their paths, root first.
    pub fn elements(&self) -> Vec<(Path, &V)> {
        let mut result = Vec::new();
        self.visit(&mut |path, value| result.push((path.clone(), value)));
        result
    }

    /// Visit all non-bottom values with their paths.
    pub fn visit<'a>(&'a self, visitor: &mut impl FnMut(&Path, &'a V)) {
        let mut path = Path::new();
        self.visit_inner(&mut path, visitor);
    }

    fn visit_inner<'a>(&'a self, path: &mut Path, visitor: &mut impl FnMut(&Path, &'a V)) {
        if !self.value.is_bottom() {
            visitor(path, &self.value);
        }
        for (element, child) in &self.children {
            let mut child_path = path.clone();
            child_path.push(*element);
            child.visit_inner(&mut child_path, visitor);
        }
    }

    /// Read the subtree at `path`, with ancestor values joined into its root.
    ///
    /// Literal-index steps also read the `[*]` background; `[*]` steps read
    /// the join of `[*]` and every literal-index sibling.
    pub fn read(&self, path: &Path) -> PathTree<V> {
        self.read_inner(&path.iter().copied().collect::<Vec<_>>(), V::bottom())
    }

    fn read_inner(&self, elements: &[PathElement], mut accumulator: V) -> PathTree<V> {
        let Some((element, rest)) = elements.split_first() else {
            let mut result = self.clone();
            result.value.join_with(&accumulator);
            return result;
        };

        accumulator.join_with(&self.value);
        let subtree = match element {
            PathElement::Index(_) => {
                let mut subtree = self.successor(element);
                if let Some(background) = self.children.get(&PathElement::AnyIndex) {
                    subtree.join_with_structural(background);
                }
                subtree
            }
            PathElement::AnyIndex => {
                let mut subtree = self.successor(element);
                for (key, child) in &self.children {
                    if matches!(key, PathElement::Index(_)) {
                        subtree.join_with_structural(child);
                    }
                }
                subtree
            }
            _ => self.successor(element),
        };
        subtree.read_inner(rest, accumulator)
    }

    /// Read the subtree at `path` without joining ancestors and without
    /// index-background semantics. Bottom if the path is absent.
    pub fn raw_read(&self, path: &Path) -> PathTree<V> {
        let mut node = self;
        for element in path.iter() {
            match node.children.get(element) {
                Some(child) => node = child,
                None => return Self::bottom(),
            }
        }
        node.clone()
    }

    /// Write a value at `path`.
    pub fn write_value(&mut self, path: &Path, value: V, kind: UpdateKind) {
        self.write(path, PathTree::leaf(value), kind);
    }

    /// Write a whole subtree at `path`.
    pub fn write(&mut self, path: &Path, subtree: PathTree<V>, kind: UpdateKind) {
        let elements: Vec<PathElement> = path.iter().copied().collect();
        self.write_inner(&elements, subtree, &V::bottom(), kind);
    }

    fn write_inner(
        &mut self,
        elements: &[PathElement],
        mut subtree: PathTree<V>,
        accumulator: &V,
        kind: UpdateKind,
    ) {
        let Some((element, rest)) = elements.split_first() else {
            match kind {
                UpdateKind::Strong => {
                    subtree.normalize(accumulator);
                    *self = subtree;
                }
                UpdateKind::Weak => {
                    subtree.normalize(accumulator);
                    self.join_with_structural(&subtree);
                    self.normalize(accumulator);
                }
            }
            return;
        };

        let mut child_accumulator = accumulator.clone();
        child_accumulator.join_with(&self.value);

        match element {
            PathElement::AnyIndex => {
                // Writing the background also weakly writes every existing
                // literal index, regardless of the requested kind.
                for (key, child) in self.children.iter_mut() {
                    if matches!(key, PathElement::Index(_)) {
                        child.write_inner(rest, subtree.clone(), &child_accumulator, UpdateKind::Weak);
                    }
                }
                self.children
                    .entry(PathElement::AnyIndex)
                    .or_insert_with(Self::bottom)
                    .write_inner(rest, subtree, &child_accumulator, kind);
            }
            PathElement::Index(_) => {
                if !self.children.contains_key(element) {
                    // A fresh literal index inherits the current background.
                    let background = self
                        .children
                        .get(&PathElement::AnyIndex)
                        .cloned()
                        .unwrap_or_else(Self::bottom);
                    self.children.insert(*element, background);
                }
                self.children
                    .get_mut(element)
                    .expect("just inserted")
                    .write_inner(rest, subtree, &child_accumulator, kind);
            }
            _ => {
                self.children
                    .entry(*element)
                    .or_insert_with(Self::bottom)
                    .write_inner(rest, subtree, &child_accumulator, kind);
            }
        }
        self.children.retain(|_, child| !child.is_bottom());
    }

    /// Structural pointwise join without re-normalization.
    fn join_with_structural(&mut self, other: &PathTree<V>) {
        self.value.join_with(&other.value);
        for (key, other_child) in &other.children {
            match self.children.get_mut(key) {
                Some(child) => child.join_with_structural(other_child),
                None => {
                    self.children.insert(*key, other_child.clone());
                }
            }
        }
    }

    /// Re-establish subsumption below this node: subtract `accumulator` from
    /// the root and ancestor values from every descendant, dropping subtrees
    /// that become bottom.
    fn normalize(&mut self, accumulator: &V) {
        self.value.difference_with(accumulator);
        let mut child_accumulator = accumulator.clone();
        child_accumulator.join_with(&self.value);
        for child in self.children.values_mut() {
            child.normalize(&child_accumulator);
        }
        self.children.retain(|_, child| !child.is_bottom());
    }

    /// Subtract `values` from every node in the tree.
    pub fn prune(&mut self, values: &V) {
        self.normalize(values);
    }

    /// Join all values in the tree into one. `transform` is applied to every
    /// value folded up from below the root and must be idempotent.
    pub fn collapse(&self, transform: impl Fn(&mut V) + Copy) -> V {
        let mut result = self.value.clone();
        for child in self.children.values() {
            child.collapse_into(&mut result, transform);
        }
        result
    }

    fn collapse_into(&self, result: &mut V, transform: impl Fn(&mut V) + Copy) {
        let mut value = self.value.clone();
        transform(&mut value);
        result.join_with(&value);
        for child in self.children.values() {
            child.collapse_into(result, transform);
        }
    }

    /// Fold every strict descendant of depth-`height` nodes into its
    /// depth-`height` ancestor, applying `transform` to the folded values.
    pub fn collapse_deeper_than(&mut self, height: usize, transform: impl Fn(&mut V) + Copy) {
        self.collapse_deeper_inner(height, transform);
        self.normalize(&V::bottom());
    }

    fn collapse_deeper_inner(&mut self, height: usize, transform: impl Fn(&mut V) + Copy) {
        if height == 0 {
            let mut folded = V::bottom();
            for child in self.children.values() {
                child.collapse_into(&mut folded, transform);
            }
            self.value.join_with(&folded);
            self.children.clear();
        } else {
            for child in self.children.values_mut() {
                child.collapse_deeper_inner(height - 1, transform);
            }
        }
    }

    /// Bound the number of leaves. When the tree exceeds `max_leaves`, the
    /// deepest cut that brings the count within the limit is taken and the
    /// excised values are folded upward through `transform`.
    pub fn limit_leaves(&mut self, max_leaves: usize, transform: impl Fn(&mut V) + Copy) {
        let leaves = self.leaf_count();
        if leaves <= max_leaves.max(1) {
            return;
        }

        // nodes[d] = number of nodes at depth d; leaves[d] = leaf nodes at d.
        let mut nodes = Vec::new();
        let mut leaves_per_depth = Vec::new();
        self.count_per_depth(0, &mut nodes, &mut leaves_per_depth);

        // Collapsing deeper than h leaves: all leaves above h, plus every
        // (now childless) node at depth h.
        let max_depth = nodes.len() - 1;
        let mut cut = 0;
        for height in (0..max_depth).rev() {
            let shallow_leaves: usize = leaves_per_depth[..height].iter().sum();
            if shallow_leaves + nodes[height] <= max_leaves.max(1) {
                cut = height;
                break;
            }
        }
        self.collapse_deeper_than(cut, transform);
    }

    fn count_per_depth(&self, depth: usize, nodes: &mut Vec<usize>, leaves: &mut Vec<usize>) {
        if nodes.len() <= depth {
            nodes.resize(depth + 1, 0);
            leaves.resize(depth + 1, 0);
        }
        nodes[depth] += 1;
        if self.children.is_empty() {
            leaves[depth] += 1;
        }
        for child in self.children.values() {
            child.count_per_depth(depth + 1, nodes, leaves);
        }
    }

    /// Walk the tree with a path-validity fold; invalid subtrees are
    /// collapsed into their parent with `transform` applied.
    ///
    /// `is_valid` receives the accumulator of the parent and the edge element
    /// and returns whether the edge is valid plus the child accumulator.
    pub fn collapse_invalid_paths<A: Clone>(
        &mut self,
        is_valid: impl Fn(&A, &PathElement) -> (bool, A) + Copy,
        accumulator: &A,
        transform: impl Fn(&mut V) + Copy,
    ) {
        let keys: Vec<PathElement> = self.children.keys().copied().collect();
        for key in keys {
            let (valid, child_accumulator) = is_valid(accumulator, &key);
            if valid {
                self.children
                    .get_mut(&key)
                    .expect("key came from the map")
                    .collapse_invalid_paths(is_valid, &child_accumulator, transform);
            } else {
                let child = self.children.remove(&key).expect("key came from the map");
                let mut folded = child.collapse(transform);
                transform(&mut folded);
                self.value.join_with(&folded);
            }
        }
    }

    /// Apply `f` to every value, dropping values that become bottom.
    pub fn map(&mut self, f: impl Fn(&mut V)) {
        self.map_inner(&f);
    }

    fn map_inner(&mut self, f: &impl Fn(&mut V)) {
        f(&mut self.value);
        for child in self.children.values_mut() {
            child.map_inner(f);
        }
        self.children.retain(|_, child| !child.is_bottom());
    }

    /// Widening: join, then collapse beyond `height` with `transform`.
    pub fn widen_with_height(
        &mut self,
        other: &PathTree<V>,
        height: usize,
        transform: impl Fn(&mut V) + Copy,
    ) {
        self.join_with(other);
        if self.height() > height {
            self.collapse_deeper_than(height, transform);
        }
    }

    fn leq_inner(&self, self_total: &V, other: &PathTree<V>, other_total: &V) -> bool {
        let bottom = Self::bottom();
        for (key, self_child) in &self.children {
            let other_child = match other.children.get(key) {
                Some(child) => child,
                // A literal index falls back to the any-index background.
                None if matches!(key, PathElement::Index(_)) => {
                    other.children.get(&PathElement::AnyIndex).unwrap_or(&bottom)
                }
                None => &bottom,
            };
            let mut self_child_total = self_total.clone();
            self_child_total.join_with(&self_child.value);
            let mut other_child_total = other_total.clone();
            other_child_total.join_with(&other_child.value);
            if !self_child_total.leq(&other_child_total) {
                return false;
            }
            if !self_child.leq_inner(&self_child_total, other_child, &other_child_total) {
                return false;
            }
        }
        true
    }
}

impl<V: TreeValue> AbstractDomain for PathTree<V> {
    fn bottom() -> Self {
        Self {
            value: V::bottom(),
            children: BTreeMap::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.value.is_bottom() && self.children.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        if !self.value.leq(&other.value) {
            return false;
        }
        self.leq_inner(&self.value, other, &other.value)
    }

    fn join_with(&mut self, other: &Self) {
        self.join_with_structural(other);
        self.normalize(&V::bottom());
    }
}

/// A family of path trees indexed by access-path roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPathTree<V: TreeValue> {
    map: BTreeMap<Root, PathTree<V>>,
}

impl<V: TreeValue> Default for AccessPathTree<V> {
    fn default() -> Self {
        Self::bottom()
    }
}

impl<V: TreeValue> AccessPathTree<V> {
    /// Read at an access path, ancestors joined in.
    pub fn read(&self, access_path: &AccessPath) -> PathTree<V> {
        self.map
            .get(&access_path.root())
            .map(|tree| tree.read(access_path.path()))
            .unwrap_or_else(PathTree::bottom)
    }

    /// Read at an access path without joining ancestors.
    pub fn raw_read(&self, access_path: &AccessPath) -> PathTree<V> {
        self.map
            .get(&access_path.root())
            .map(|tree| tree.raw_read(access_path.path()))
            .unwrap_or_else(PathTree::bottom)
    }

    /// Write a value at an access path.
    pub fn write_value(&mut self, access_path: &AccessPath, value: V, kind: UpdateKind) {
        self.write(access_path, PathTree::leaf(value), kind);
    }

    /// Write a subtree at an access path.
    pub fn write(&mut self, access_path: &AccessPath, subtree: PathTree<V>, kind: UpdateKind) {
        let tree = self
            .map
            .entry(access_path.root())
            .or_insert_with(PathTree::bottom);
        tree.write(access_path.path(), subtree, kind);
        if tree.is_bottom() {
            self.map.remove(&access_path.root());
        }
    }

    /// The tree rooted at `root`, if any.
    pub fn tree_at(&self, root: Root) -> Option<&PathTree<V>> {
        self.map.get(&root)
    }

    /// Iterate over the root trees.
    pub fn iter(&self) -> impl Iterator<Item = (&Root, &PathTree<V>)> {
        self.map.iter()
    }

    /// All non-bottom values with their full access paths.
    pub fn elements(&self) -> Vec<(AccessPath, &V)> {
        let mut result = Vec::new();
        for (root, tree) in &self.map {
            tree.visit(&mut |path, value| {
                result.push((AccessPath::new(*root, path.clone()), value));
            });
        }
        result
    }

    /// Apply `f` to every value in every root tree.
    pub fn map(&mut self, f: impl Fn(&mut V)) {
        for tree in self.map.values_mut() {
            tree.map_inner(&f);
        }
        self.map.retain(|_, tree| !tree.is_bottom());
    }

    /// Bound the number of leaves per root tree.
    pub fn limit_leaves(&mut self, max_leaves: usize, transform: impl Fn(&mut V) + Copy) {
        for tree in self.map.values_mut() {
            tree.limit_leaves(max_leaves, transform);
        }
    }
}

impl<V: TreeValue> AbstractDomain for AccessPathTree<V> {
    fn bottom() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.map.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        self.map.iter().all(|(root, tree)| {
            other
                .map
                .get(root)
                .map(|other_tree| tree.leq(other_tree))
                .unwrap_or_else(|| tree.is_bottom())
        })
    }

    fn join_with(&mut self, other: &Self) {
        for (root, other_tree) in &other.map {
            match self.map.get_mut(root) {
                Some(tree) => tree.join_with(other_tree),
                None => {
                    self.map.insert(*root, other_tree.clone());
                }
            }
        }
    }
}
