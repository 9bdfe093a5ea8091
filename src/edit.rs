//! Structural edits on a tree
//!
//! Every operation here keeps word order and topology consistent:
//!
//! - `ord` values of the live words are always exactly `1..=N`
//! - following first-child/next-sibling links from a node yields exactly
//!   the nodes whose parent is that node
//! - no node is its own ancestor
//!
//! Reparenting never touches word order and shifting never touches
//! topology. Errors are raised before any link or position changes.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::document::IdGenerator;
use crate::error::TreeError;
use crate::node::{Governor, Node, NodeId};
use crate::tree::Tree;

/// Options for [`Tree::remove`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    /// Attach the node's children to its parent before removing it
    pub rehang: bool,
    /// Warn if the node still has children (and `rehang` is off)
    pub warn: bool,
}

impl RemoveOptions {
    pub const REHANG: RemoveOptions = RemoveOptions {
        rehang: true,
        warn: false,
    };

    pub const WARN: RemoveOptions = RemoveOptions {
        rehang: false,
        warn: true,
    };
}

/// Where a shifted node lands relative to its reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftMode {
    BeforeNode,
    AfterNode,
    BeforeSubtree,
    AfterSubtree,
}

impl ShiftMode {
    fn is_after(self) -> bool {
        matches!(self, ShiftMode::AfterNode | ShiftMode::AfterSubtree)
    }

    fn is_subtree(self) -> bool {
        matches!(self, ShiftMode::BeforeSubtree | ShiftMode::AfterSubtree)
    }
}

/// Options for [`Tree::shift`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftOptions {
    /// Move only the node, leaving its descendants in place
    pub without_children: bool,
    /// Do nothing if the reference lies inside the moved subtree
    pub skip_if_descendant: bool,
}

impl ShiftOptions {
    pub const WITHOUT_CHILDREN: ShiftOptions = ShiftOptions {
        without_children: true,
        skip_if_descendant: false,
    };

    pub const SKIP_IF_DESCENDANT: ShiftOptions = ShiftOptions {
        without_children: false,
        skip_if_descendant: true,
    };
}

impl Tree {
    /// Create a new word as the first child of `parent`
    ///
    /// The word is appended to the end of the word order; shift it to put
    /// it elsewhere.
    pub fn create_child(
        &mut self,
        ids: &mut IdGenerator,
        parent: NodeId,
    ) -> Result<NodeId, TreeError> {
        self.check_live(parent)?;
        let id = self.push_detached(ids);
        self.link(id, parent);
        Ok(id)
    }

    /// Append a word with no parent yet; the reader links it afterwards
    pub(crate) fn push_detached(&mut self, ids: &mut IdGenerator) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(ids.next_id(), self.order.len() + 1));
        self.order.push(id);
        id
    }

    /// Make `new_parent` the parent of `node`
    ///
    /// Fails with [`TreeError::Cycle`] if `new_parent` is `node` or one of
    /// its descendants; with `skip_cycles` such a call does nothing instead.
    pub fn set_parent(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        skip_cycles: bool,
    ) -> Result<(), TreeError> {
        self.check_live(node)?;
        self.check_live(new_parent)?;
        if node.is_root() {
            return Err(TreeError::invalid("the technical root cannot have a parent"));
        }

        if node == new_parent {
            if skip_cycles {
                return Ok(());
            }
            let ord = self.ord(node);
            return Err(TreeError::Cycle { ord, parent: ord });
        }
        // A leaf cannot be an ancestor of anything.
        if self.nodes[node.0].first_child.is_some() {
            let mut ancestor = self.nodes[new_parent.0].parent;
            while let Some(a) = ancestor {
                if a == node {
                    if skip_cycles {
                        return Ok(());
                    }
                    return Err(TreeError::Cycle {
                        ord: self.ord(node),
                        parent: self.ord(new_parent),
                    });
                }
                ancestor = self.nodes[a.0].parent;
            }
        }

        self.unlink(node);
        self.link(node, new_parent);
        Ok(())
    }

    /// Remove a node together with its whole subtree
    ///
    /// Removing an already removed node does nothing.
    pub fn remove(&mut self, node: NodeId, options: RemoveOptions) -> Result<(), TreeError> {
        if node.is_root() {
            return Err(TreeError::invalid("the technical root cannot be removed"));
        }
        let Some(current) = self.get(node) else {
            return Err(TreeError::invalid(format!("unknown node {}", node.0)));
        };
        if current.removed {
            return Ok(());
        }
        let has_children = current.first_child.is_some();
        let parent = current
            .parent
            .ok_or_else(|| TreeError::invalid("node is not attached to the tree"))?;

        if options.rehang {
            self.rehang_children(node, parent);
        } else if options.warn && has_children {
            warn!(
                node = %self.node_address(None, node),
                "node is being removed but it has (unexpected) children"
            );
        }

        let mut doomed = self.subtree(node, None);
        doomed.push(node);
        let doomed_set: FxHashSet<NodeId> = doomed.iter().copied().collect();

        self.order.retain(|id| !doomed_set.contains(id));
        self.normalize_order();
        self.unlink(node);
        for id in &doomed {
            self.nodes[id.0].removed = true;
        }
        self.drop_references(&doomed_set);

        debug!(removed = doomed.len(), remaining = self.order.len(), "removed subtree");
        Ok(())
    }

    /// Move `node` in word order relative to `reference`
    ///
    /// Unless `without_children` is set (or the node is a leaf), the node's
    /// whole subtree moves as one block. Parent links never change.
    pub fn shift(
        &mut self,
        node: NodeId,
        reference: NodeId,
        mode: ShiftMode,
        options: ShiftOptions,
    ) -> Result<(), TreeError> {
        self.check_live(node)?;
        self.check_live(reference)?;
        if node.is_root() {
            return Err(TreeError::invalid("the technical root cannot be shifted"));
        }
        if !mode.is_subtree() && node == reference {
            return Ok(());
        }
        if mode == ShiftMode::BeforeNode && reference.is_root() {
            return Err(TreeError::invalid("nothing can precede the technical root"));
        }

        let without_children =
            options.without_children || self.nodes[node.0].first_child.is_none();
        let reference_inside =
            !without_children && (reference == node || self.is_descendant_of(reference, node));
        if reference_inside && options.skip_if_descendant {
            return Ok(());
        }

        let mut moving = vec![node];
        if !without_children {
            moving.extend(self.subtree(node, None));
        }
        let moving_set: FxHashSet<NodeId> = moving.iter().copied().collect();

        let anchor = if mode.is_subtree() {
            let mut candidates = self.subtree(reference, None);
            candidates.push(reference);
            let candidates = candidates
                .into_iter()
                .filter(|id| !id.is_root() && !moving_set.contains(id));
            let best = if mode.is_after() {
                candidates.max_by_key(|id| self.ord(*id))
            } else {
                candidates.min_by_key(|id| self.ord(*id))
            };
            match best {
                Some(anchor) => anchor,
                // The whole reference subtree moves along; anchor on the reference itself.
                None if reference_inside => reference,
                None if without_children => return Ok(()),
                None => {
                    return Err(TreeError::invalid(
                        "the subtree of the reference lies entirely inside the moved subtree",
                    ));
                }
            }
        } else {
            reference
        };

        if reference_inside {
            warn!(
                node = %self.node_address(None, node),
                reference = %self.node_address(None, reference),
                "reference is a descendant of the shifted node; maybe without_children was forgotten"
            );
        }

        let target = self.ord(anchor) + usize::from(mode.is_after());
        let first = moving.iter().map(|id| self.ord(*id)).min().unwrap_or(target);
        let last = moving.iter().map(|id| self.ord(*id)).max().unwrap_or(target);
        self.move_block(&moving_set, first, last, target);
        Ok(())
    }

    pub fn shift_after_node(
        &mut self,
        node: NodeId,
        reference: NodeId,
        options: ShiftOptions,
    ) -> Result<(), TreeError> {
        self.shift(node, reference, ShiftMode::AfterNode, options)
    }

    pub fn shift_before_node(
        &mut self,
        node: NodeId,
        reference: NodeId,
        options: ShiftOptions,
    ) -> Result<(), TreeError> {
        self.shift(node, reference, ShiftMode::BeforeNode, options)
    }

    pub fn shift_after_subtree(
        &mut self,
        node: NodeId,
        reference: NodeId,
        options: ShiftOptions,
    ) -> Result<(), TreeError> {
        self.shift(node, reference, ShiftMode::AfterSubtree, options)
    }

    pub fn shift_before_subtree(
        &mut self,
        node: NodeId,
        reference: NodeId,
        options: ShiftOptions,
    ) -> Result<(), TreeError> {
        self.shift(node, reference, ShiftMode::BeforeSubtree, options)
    }

    /// Renumber `ord` from the word order index
    pub fn normalize_order(&mut self) {
        for (i, id) in self.order.iter().enumerate() {
            self.nodes[id.0].ord = i + 1;
        }
    }

    pub(crate) fn check_live(&self, id: NodeId) -> Result<(), TreeError> {
        match self.get(id) {
            None => Err(TreeError::invalid(format!("unknown node {}", id.0))),
            Some(node) if node.removed => Err(TreeError::invalid(format!(
                "node {} has been removed",
                id.0
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Put `node` at the head of `parent`'s child chain
    pub(crate) fn link(&mut self, node: NodeId, parent: NodeId) {
        self.nodes[node.0].parent = Some(parent);
        self.nodes[node.0].next_sibling = self.nodes[parent.0].first_child;
        self.nodes[parent.0].first_child = Some(node);
    }

    /// Splice `node` out of its parent's child chain
    fn unlink(&mut self, node: NodeId) {
        let Some(parent) = self.nodes[node.0].parent else {
            return;
        };
        let next = self.nodes[node.0].next_sibling;
        if self.nodes[parent.0].first_child == Some(node) {
            self.nodes[parent.0].first_child = next;
        } else {
            let mut current = self.nodes[parent.0].first_child;
            while let Some(c) = current {
                if self.nodes[c.0].next_sibling == Some(node) {
                    self.nodes[c.0].next_sibling = next;
                    break;
                }
                current = self.nodes[c.0].next_sibling;
            }
        }
        self.nodes[node.0].parent = None;
        self.nodes[node.0].next_sibling = None;
    }

    /// Hand the whole child chain of `node` over to `parent`, keeping its order
    fn rehang_children(&mut self, node: NodeId, parent: NodeId) {
        let children: Vec<NodeId> = self.child_chain(node).collect();
        let (Some(&first), Some(&last)) = (children.first(), children.last()) else {
            return;
        };
        for child in &children {
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[last.0].next_sibling = self.nodes[parent.0].first_child;
        self.nodes[parent.0].first_child = Some(first);
        self.nodes[node.0].first_child = None;
    }

    /// Forget multiword, empty-node and enhanced-dependency links to removed nodes
    fn drop_references(&mut self, removed: &FxHashSet<NodeId>) {
        if removed.iter().any(|id| self.nodes[id.0].mwt.is_some()) {
            let mut kept = Vec::with_capacity(self.multiwords.len());
            for mut mwt in std::mem::take(&mut self.multiwords) {
                mwt.words.retain(|w| !removed.contains(w));
                if mwt.words.is_empty() {
                    continue;
                }
                for w in &mwt.words {
                    self.nodes[w.0].mwt = Some(kept.len());
                }
                kept.push(mwt);
            }
            self.multiwords = kept;
            for id in removed {
                self.nodes[id.0].mwt = None;
            }
        }

        self.empty_nodes
            .retain(|e| e.anchor.is_none_or(|anchor| !removed.contains(&anchor)));

        // An empty-node governor dies with its anchor word.
        let live = |g: Governor| match g {
            Governor::Node(n) | Governor::Empty(Some(n), _) => !removed.contains(&n),
            Governor::Root | Governor::Empty(None, _) => true,
        };
        let Tree {
            nodes,
            order,
            empty_nodes,
            ..
        } = self;
        for id in order.iter() {
            nodes[id.0].deps.retain_governors(live);
        }
        for empty in empty_nodes.iter_mut() {
            empty.deps.retain_governors(live);
        }
    }

    /// Place the moving nodes as one block right before position `target`
    ///
    /// `first..=last` is the current ord span of the moving nodes. Only the
    /// window spanning both the old block and `target` is rewritten; nodes
    /// inside it keep their relative order within each group.
    fn move_block(
        &mut self,
        moving: &FxHashSet<NodeId>,
        first: usize,
        last: usize,
        target: usize,
    ) {
        let lo = first.min(target);
        let hi = last.max(target - 1).min(self.order.len());

        let mut before = Vec::new();
        let mut block = Vec::with_capacity(moving.len());
        let mut after = Vec::new();
        for (offset, id) in self.order[lo - 1..hi].iter().enumerate() {
            if moving.contains(id) {
                block.push(*id);
            } else if lo + offset < target {
                before.push(*id);
            } else {
                after.push(*id);
            }
        }

        let mut ord = lo;
        for id in before.into_iter().chain(block).chain(after) {
            self.order[ord - 1] = id;
            self.nodes[id.0].ord = ord;
            ord += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::EnhancedDep;
    use crate::tree::Select;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Check both views of the tree against each other
    fn check_invariants(tree: &Tree) {
        for (i, id) in tree.words().iter().enumerate() {
            let node = tree.node(*id);
            assert!(!node.is_removed());
            assert_eq!(node.ord(), i + 1, "ord out of step with word order");
        }

        let live: FxHashSet<NodeId> = tree.words().iter().copied().collect();
        assert_eq!(live.len(), tree.len(), "duplicate entries in word order");

        let mut chained = 0;
        for id in std::iter::once(NodeId::ROOT).chain(tree.words().iter().copied()) {
            for child in tree.child_chain(id) {
                assert_eq!(tree.parent(child), Some(id), "child chain disagrees with parent");
                assert!(live.contains(&child));
                chained += 1;
            }
        }
        assert_eq!(chained, tree.len(), "every word is in exactly one chain");

        for id in tree.words() {
            let mut steps = 0;
            let mut current = tree.parent(*id);
            while let Some(p) = current {
                steps += 1;
                assert!(steps <= tree.len(), "cycle above {:?}", id);
                current = tree.parent(p);
                if p.is_root() {
                    assert!(current.is_none());
                }
            }
        }
    }

    fn forms(tree: &Tree) -> Vec<String> {
        tree.words()
            .iter()
            .map(|id| tree.node(*id).form.clone().unwrap_or_default())
            .collect()
    }

    /// Words named by `forms`, all children of the root, in order
    fn flat(forms: &[&str]) -> (Tree, IdGenerator, Vec<NodeId>) {
        let mut ids = IdGenerator::default();
        let mut tree = Tree::new(&mut ids);
        let nodes = forms
            .iter()
            .map(|form| {
                let id = tree.create_child(&mut ids, NodeId::ROOT).unwrap();
                tree.node_mut(id).form = Some(form.to_string());
                id
            })
            .collect();
        (tree, ids, nodes)
    }

    #[derive(Clone)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` and return whatever it logged at WARN level
    fn capture_warnings(f: impl FnOnce()) -> String {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Captured(buf.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = buf.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    // ===== create_child / set_parent =====

    #[test]
    fn test_create_child_appends() {
        let (mut tree, mut ids, n) = flat(&["a", "b"]);
        let c = tree.create_child(&mut ids, n[0]).unwrap();
        assert_eq!(tree.ord(c), 3);
        assert_eq!(tree.parent(c), Some(n[0]));
        assert_eq!(tree.children(n[0], Select::ALL), vec![c]);
        assert!(tree.node(c).uid() > tree.node(n[1]).uid());
        check_invariants(&tree);
    }

    #[test]
    fn test_cycle_rejected() {
        // A -> B -> C
        let (mut tree, _, n) = flat(&["A", "B", "C"]);
        tree.set_parent(n[1], n[0], false).unwrap();
        tree.set_parent(n[2], n[1], false).unwrap();

        let err = tree.set_parent(n[0], n[2], false).unwrap_err();
        assert_eq!(err, TreeError::Cycle { ord: 1, parent: 3 });
        assert_eq!(tree.parent(n[0]), Some(NodeId::ROOT));
        assert_eq!(tree.parent(n[1]), Some(n[0]));
        assert_eq!(tree.parent(n[2]), Some(n[1]));
        check_invariants(&tree);

        tree.set_parent(n[0], n[2], true).unwrap();
        assert_eq!(tree.parent(n[0]), Some(NodeId::ROOT));
        assert_eq!(tree.parent(n[2]), Some(n[1]));
        check_invariants(&tree);
    }

    #[test]
    fn test_self_parent() {
        let (mut tree, _, n) = flat(&["A"]);
        let err = tree.set_parent(n[0], n[0], false).unwrap_err();
        assert!(err.is_cycle());
        assert!(tree.set_parent(n[0], n[0], true).is_ok());
        assert_eq!(tree.parent(n[0]), Some(NodeId::ROOT));
    }

    #[test]
    fn test_set_parent_keeps_sibling_chain() {
        let (mut tree, _, n) = flat(&["p", "a", "b", "c"]);
        for child in &n[1..] {
            tree.set_parent(*child, n[0], false).unwrap();
        }
        tree.set_parent(n[2], NodeId::ROOT, false).unwrap();

        let chain: Vec<NodeId> = tree.child_chain(n[0]).collect();
        assert_eq!(chain, vec![n[3], n[1]]);
        assert_eq!(tree.children(n[0], Select::ALL), vec![n[1], n[3]]);
        // word order untouched by reparenting
        assert_eq!(forms(&tree), vec!["p", "a", "b", "c"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_root_cannot_get_parent() {
        let (mut tree, _, n) = flat(&["a"]);
        let err = tree.set_parent(NodeId::ROOT, n[0], false).unwrap_err();
        assert!(matches!(err, TreeError::InvalidOperation(_)));
    }

    // ===== remove =====

    #[test]
    fn test_remove_with_rehang() {
        // root -> P -> {X, Y}
        let (mut tree, _, n) = flat(&["X", "P", "Y"]);
        tree.set_parent(n[0], n[1], false).unwrap();
        tree.set_parent(n[2], n[1], false).unwrap();

        tree.remove(n[1], RemoveOptions::REHANG).unwrap();

        assert_eq!(forms(&tree), vec!["X", "Y"]);
        assert_eq!(tree.ord(n[0]), 1);
        assert_eq!(tree.ord(n[2]), 2);
        assert_eq!(tree.children(NodeId::ROOT, Select::ALL), vec![n[0], n[2]]);
        assert!(tree.node(n[1]).is_removed());
        check_invariants(&tree);
    }

    #[test]
    fn test_remove_takes_subtree() {
        let (mut tree, _, n) = flat(&["a", "b", "c", "d"]);
        tree.set_parent(n[0], n[2], false).unwrap();
        tree.set_parent(n[1], n[0], false).unwrap();

        tree.remove(n[2], RemoveOptions::default()).unwrap();

        assert_eq!(forms(&tree), vec!["d"]);
        assert_eq!(tree.ord(n[3]), 1);
        for id in &n[..3] {
            assert!(tree.node(*id).is_removed());
        }
        check_invariants(&tree);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let (mut tree, _, n) = flat(&["a", "b"]);
        tree.remove(n[0], RemoveOptions::default()).unwrap();
        tree.remove(n[0], RemoveOptions::default()).unwrap();
        assert_eq!(forms(&tree), vec!["b"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_remove_root_fails() {
        let (mut tree, _, _) = flat(&["a"]);
        let err = tree.remove(NodeId::ROOT, RemoveOptions::default()).unwrap_err();
        assert!(matches!(err, TreeError::InvalidOperation(_)));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_removed_node_rejects_operations() {
        let (mut tree, mut ids, n) = flat(&["a", "b"]);
        tree.remove(n[0], RemoveOptions::default()).unwrap();

        assert!(tree.set_parent(n[0], n[1], false).is_err());
        assert!(tree.set_parent(n[1], n[0], false).is_err());
        assert!(tree.create_child(&mut ids, n[0]).is_err());
        assert!(
            tree.shift_after_node(n[0], n[1], ShiftOptions::default())
                .is_err()
        );
        check_invariants(&tree);
    }

    #[test]
    fn test_remove_warns_about_children() {
        let (mut tree, _, n) = flat(&["a", "b", "c"]);
        tree.set_parent(n[0], n[1], false).unwrap();

        let logged = capture_warnings(|| {
            tree.remove(n[1], RemoveOptions::WARN).unwrap();
        });
        assert!(logged.contains("unexpected"), "got: {}", logged);
        assert_eq!(forms(&tree), vec!["c"]);
        check_invariants(&tree);

        let logged = capture_warnings(|| {
            tree.remove(n[2], RemoveOptions::WARN).unwrap();
        });
        assert!(logged.is_empty());
    }

    #[test]
    fn test_remove_cleans_references() {
        let (mut tree, _, n) = flat(&["a", "b", "c"]);
        tree.add_multiword(vec![n[0], n[1]], "ab", None);
        tree.node_mut(n[2]).deps.set(vec![
            EnhancedDep {
                governor: Governor::Node(n[1]),
                rel: "obj".to_string(),
            },
            EnhancedDep {
                governor: Governor::Root,
                rel: "root".to_string(),
            },
        ]);

        tree.remove(n[1], RemoveOptions::default()).unwrap();

        assert_eq!(tree.multiwords().len(), 1);
        assert_eq!(tree.multiwords()[0].words(), &[n[0]]);
        assert_eq!(tree.node(n[2]).deps.items().len(), 1);
        assert_eq!(tree.format_deps(&tree.node(n[2]).deps), "0:root");

        tree.remove(n[0], RemoveOptions::default()).unwrap();
        assert!(tree.multiwords().is_empty());
        assert_eq!(tree.node(n[0]).mwt(), None);
    }

    // ===== shift =====

    #[test]
    fn test_shift_self_is_noop() {
        let (mut tree, _, n) = flat(&["a", "b", "c"]);
        tree.set_parent(n[2], n[1], false).unwrap();
        tree.shift_after_node(n[1], n[1], ShiftOptions::default())
            .unwrap();
        tree.shift_before_node(n[1], n[1], ShiftOptions::WITHOUT_CHILDREN)
            .unwrap();
        assert_eq!(forms(&tree), vec!["a", "b", "c"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_shift_single_node() {
        let (mut tree, _, n) = flat(&["a", "b", "c", "d", "e"]);
        tree.shift_after_node(n[1], n[3], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["a", "c", "d", "b", "e"]);
        check_invariants(&tree);

        tree.shift_before_node(n[4], n[0], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["e", "a", "c", "d", "b"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_shift_round_trip() {
        let words = ["w1", "w2", "w3", "w4", "w5", "w6"];
        for k in 0..words.len() - 1 {
            let (mut tree, _, n) = flat(&words);
            let last = n[words.len() - 1];
            tree.shift_after_node(n[k], last, ShiftOptions::default())
                .unwrap();
            tree.shift_before_node(n[k], n[k + 1], ShiftOptions::default())
                .unwrap();
            assert_eq!(forms(&tree), words.to_vec());
            check_invariants(&tree);
        }
    }

    #[test]
    fn test_shift_after_root_moves_to_front() {
        let (mut tree, _, n) = flat(&["a", "b", "c"]);
        tree.shift_after_node(n[2], NodeId::ROOT, ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["c", "a", "b"]);
        assert!(
            tree.shift_before_node(n[0], NodeId::ROOT, ShiftOptions::default())
                .is_err()
        );
        check_invariants(&tree);
    }

    /// head(3) with dependents d1(1) d2(5) d3(7) among fillers
    fn subtree_sample() -> (Tree, Vec<NodeId>) {
        let (mut tree, _, n) = flat(&["d1", "x", "head", "y", "d2", "z", "d3", "w"]);
        tree.set_parent(n[0], n[2], false).unwrap();
        tree.set_parent(n[4], n[2], false).unwrap();
        tree.set_parent(n[6], n[4], false).unwrap();
        (tree, n)
    }

    #[test]
    fn test_subtree_move_keeps_internal_order() {
        let (mut tree, n) = subtree_sample();
        tree.shift_after_node(n[2], n[7], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["x", "y", "z", "w", "d1", "head", "d2", "d3"]);
        check_invariants(&tree);

        tree.shift_before_node(n[2], n[1], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["d1", "head", "d2", "d3", "x", "y", "z", "w"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_subtree_move_to_middle() {
        let (mut tree, n) = subtree_sample();
        tree.shift_before_node(n[2], n[5], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["x", "y", "d1", "head", "d2", "d3", "z", "w"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_shift_without_children() {
        let (mut tree, n) = subtree_sample();
        tree.shift_after_node(n[2], n[7], ShiftOptions::WITHOUT_CHILDREN)
            .unwrap();
        assert_eq!(forms(&tree), vec!["d1", "x", "y", "d2", "z", "d3", "w", "head"]);
        assert_eq!(tree.parent(n[0]), Some(n[2]));
        check_invariants(&tree);
    }

    #[test]
    fn test_shift_after_subtree() {
        // postposition: "in house" -> "house in"
        let (mut tree, _, n) = flat(&["in", "the", "house", "now"]);
        tree.set_parent(n[0], n[2], false).unwrap();
        tree.set_parent(n[1], n[2], false).unwrap();

        tree.shift_after_subtree(n[0], n[2], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["the", "house", "in", "now"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_shift_before_subtree() {
        let (mut tree, _, n) = flat(&["a", "b", "c", "d"]);
        tree.set_parent(n[1], n[2], false).unwrap();
        tree.set_parent(n[3], n[2], false).unwrap();

        tree.shift_before_subtree(n[0], n[2], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["a", "b", "c", "d"]);

        tree.shift_before_subtree(n[3], n[2], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["a", "d", "b", "c"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_subtree_shift_without_children_skips_self() {
        // the moved node is the only thing in the reference subtree besides itself
        let (mut tree, _, n) = flat(&["a", "b", "c"]);
        tree.set_parent(n[2], n[0], false).unwrap();

        tree.shift_before_subtree(n[2], n[0], ShiftOptions::WITHOUT_CHILDREN)
            .unwrap();
        assert_eq!(forms(&tree), vec!["c", "a", "b"]);
        check_invariants(&tree);

        // reference subtree is just the moving node: nothing to anchor on
        tree.shift_after_subtree(n[2], n[2], ShiftOptions::WITHOUT_CHILDREN)
            .unwrap();
        assert_eq!(forms(&tree), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_subtree_shift_inside_moving_set_warns() {
        let (mut tree, n) = subtree_sample();
        tree.shift_after_subtree(n[2], n[4], ShiftOptions::SKIP_IF_DESCENDANT)
            .unwrap();
        assert_eq!(forms(&tree), vec!["d1", "x", "head", "y", "d2", "z", "d3", "w"]);

        let logged = capture_warnings(|| {
            tree.shift_after_subtree(n[2], n[4], ShiftOptions::default())
                .unwrap();
        });
        assert!(logged.contains("descendant"), "got: {}", logged);
        // anchored on d2 itself: the block closes up right before z
        assert_eq!(forms(&tree), vec!["x", "y", "d1", "head", "d2", "d3", "z", "w"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_subtree_shift_onto_own_child() {
        let (mut tree, _, n) = flat(&["a", "b", "c", "d"]);
        tree.set_parent(n[2], n[1], false).unwrap();

        let logged = capture_warnings(|| {
            tree.shift_after_subtree(n[1], n[2], ShiftOptions::default())
                .unwrap();
        });
        assert!(logged.contains("descendant"), "got: {}", logged);
        assert_eq!(forms(&tree), vec!["a", "b", "c", "d"]);

        tree.shift_before_subtree(n[1], n[2], ShiftOptions::default())
            .unwrap();
        assert_eq!(forms(&tree), vec!["a", "b", "c", "d"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_skip_if_descendant() {
        let (mut tree, n) = subtree_sample();
        tree.shift_after_node(n[2], n[6], ShiftOptions::SKIP_IF_DESCENDANT)
            .unwrap();
        assert_eq!(forms(&tree), vec!["d1", "x", "head", "y", "d2", "z", "d3", "w"]);
    }

    #[test]
    fn test_shift_into_own_subtree_warns() {
        let (mut tree, n) = subtree_sample();
        let logged = capture_warnings(|| {
            tree.shift_after_node(n[2], n[4], ShiftOptions::default())
                .unwrap();
        });
        assert!(logged.contains("descendant"), "got: {}", logged);
        // non-moving nodes before d2 stay in front, the block follows
        assert_eq!(forms(&tree), vec!["x", "y", "d1", "head", "d2", "d3", "z", "w"]);
        check_invariants(&tree);
    }

    #[test]
    fn test_shift_keeps_topology() {
        let (mut tree, n) = subtree_sample();
        let before: Vec<Option<NodeId>> = n.iter().map(|id| tree.parent(*id)).collect();
        tree.shift_before_node(n[6], n[0], ShiftOptions::default())
            .unwrap();
        tree.shift_after_subtree(n[1], n[2], ShiftOptions::default())
            .unwrap();
        let after: Vec<Option<NodeId>> = n.iter().map(|id| tree.parent(*id)).collect();
        assert_eq!(before, after);
        check_invariants(&tree);
    }

    // ===== mixed workload =====

    /// Linear congruential generator, deterministic across platforms
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: usize) -> usize {
            self.0 = (1103515245 * self.0 + 12345) % (1 << 32);
            (self.0 % n as u64) as usize
        }
    }

    #[test]
    fn test_random_edits_keep_invariants() {
        let words: Vec<String> = (1..=40).map(|i| format!("w{}", i)).collect();
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();
        let (mut tree, mut ids, _) = flat(&refs);
        let mut rng = Lcg(42);

        for round in 0..200 {
            if tree.is_empty() {
                break;
            }
            let nodes = tree.words().to_vec();
            let a = nodes[rng.below(nodes.len())];
            let b = nodes[rng.below(nodes.len())];
            match round % 6 {
                0 | 1 => tree.set_parent(a, b, true).unwrap(),
                2 => {
                    let child = tree.create_child(&mut ids, a).unwrap();
                    tree.shift_after_subtree(child, a, ShiftOptions::default())
                        .unwrap();
                }
                3 => tree
                    .shift_after_node(a, b, ShiftOptions::SKIP_IF_DESCENDANT)
                    .unwrap(),
                4 => tree
                    .shift_before_subtree(a, b, ShiftOptions::WITHOUT_CHILDREN)
                    .unwrap(),
                _ => {
                    if rng.below(3) == 0 {
                        tree.remove(a, RemoveOptions::REHANG).unwrap();
                    }
                }
            }
            check_invariants(&tree);
        }
    }
}
