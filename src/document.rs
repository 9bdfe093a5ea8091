//! Documents and bundles
//!
//! A [`Document`] is an ordered list of [`Bundle`]s, each holding the trees
//! of one sentence in different zones. The document also owns the
//! [`IdGenerator`] that hands out node ids; it is passed explicitly to every
//! call that creates nodes.

use crate::edit::RemoveOptions;
use crate::error::TreeError;
use crate::node::NodeId;
use crate::tree::Tree;

/// Monotonic source of node ids, never reset
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Most recently issued id (0 before the first call)
    pub fn last(&self) -> u64 {
        self.last
    }
}

/// Parallel trees of one sentence
#[derive(Debug, Default)]
pub struct Bundle {
    id: Option<String>,
    trees: Vec<Tree>,
}

impl Bundle {
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            trees: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    /// Append a new empty tree (zone `und`)
    pub fn create_tree(&mut self, ids: &mut IdGenerator) -> &mut Tree {
        self.add_tree(Tree::new(ids))
    }

    pub fn add_tree(&mut self, tree: Tree) -> &mut Tree {
        self.trees.push(tree);
        let last = self.trees.len() - 1;
        &mut self.trees[last]
    }

    pub fn remove_tree(&mut self, index: usize) -> Option<Tree> {
        (index < self.trees.len()).then(|| self.trees.remove(index))
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn trees_mut(&mut self) -> &mut [Tree] {
        &mut self.trees
    }

    pub fn tree_by_zone(&self, zone: &str) -> Option<&Tree> {
        self.trees.iter().find(|t| t.zone() == zone)
    }

    pub fn tree_by_zone_mut(&mut self, zone: &str) -> Option<&mut Tree> {
        self.trees.iter_mut().find(|t| t.zone() == zone)
    }

    pub fn has_zone(&self, zone: &str) -> bool {
        self.tree_by_zone(zone).is_some()
    }
}

/// An ordered sequence of bundles plus the id generator of their nodes
#[derive(Debug, Default)]
pub struct Document {
    ids: IdGenerator,
    bundles: Vec<Bundle>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh node id
    pub fn next_id(&mut self) -> u64 {
        self.ids.next_id()
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// Append a new bundle without an id
    pub fn create_bundle(&mut self) -> &mut Bundle {
        self.add_bundle(Bundle::default())
    }

    pub fn add_bundle(&mut self, bundle: Bundle) -> &mut Bundle {
        self.bundles.push(bundle);
        let last = self.bundles.len() - 1;
        &mut self.bundles[last]
    }

    /// Detach a bundle; its trees go with it
    pub fn remove_bundle(&mut self, index: usize) -> Option<Bundle> {
        (index < self.bundles.len()).then(|| self.bundles.remove(index))
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn bundles_mut(&mut self) -> &mut [Bundle] {
        &mut self.bundles
    }

    pub fn bundle_mut(&mut self, index: usize) -> Option<&mut Bundle> {
        self.bundles.get_mut(index)
    }

    pub fn last_bundle_mut(&mut self) -> Option<&mut Bundle> {
        self.bundles.last_mut()
    }

    /// Borrow the id generator and the bundles at the same time
    ///
    /// Needed to create nodes in a tree that lives inside this document.
    pub fn split_mut(&mut self) -> (&mut IdGenerator, &mut [Bundle]) {
        (&mut self.ids, &mut self.bundles)
    }

    /// Number of bundles
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// All trees of all bundles, in document order
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.bundles.iter().flat_map(|b| b.trees.iter())
    }

    /// Create a word under `parent` in tree `tree` of bundle `bundle`
    pub fn create_child(
        &mut self,
        bundle: usize,
        tree: usize,
        parent: NodeId,
    ) -> Result<NodeId, TreeError> {
        let target = self
            .bundles
            .get_mut(bundle)
            .and_then(|b| b.trees.get_mut(tree))
            .ok_or_else(|| TreeError::invalid(format!("no tree {} in bundle {}", tree, bundle)))?;
        target.create_child(&mut self.ids, parent)
    }

    /// Remove a word from tree `tree` of bundle `bundle`
    pub fn remove_node(
        &mut self,
        bundle: usize,
        tree: usize,
        node: NodeId,
        options: RemoveOptions,
    ) -> Result<(), TreeError> {
        self.bundles
            .get_mut(bundle)
            .and_then(|b| b.trees.get_mut(tree))
            .ok_or_else(|| TreeError::invalid(format!("no tree {} in bundle {}", tree, bundle)))?
            .remove(node, options)
    }
}
