//! Sentence trees with full CoNLL-U support
//!
//! A [`Tree`] owns every node of one sentence in an arena. Two views of the
//! same structure are kept in step:
//!
//! - word order: `order[i]` is the node whose `ord` is `i + 1`
//! - topology: each node links to its parent, its first child and its next
//!   sibling
//!
//! Index 0 of the arena is the technical root (ord 0). It is never part of
//! the word order and can never be removed. Mutating operations live in
//! [`crate::edit`]; this module holds the data and the read-only queries.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::IdGenerator;
use crate::node::{EmptyNode, EnhancedDep, EnhancedDeps, Governor, Mwt, Node, NodeId};

/// Zone used when the input does not name one
pub const DEFAULT_ZONE: &str = "und";

static ZONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z-]*(_[A-Za-z0-9-]+)?$").expect("valid zone regex"));
static SENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*sent_id(?:\s*=\s*|\s+)(\S+)").expect("valid sent_id regex"));
static TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*text\s*=\s*(.+)$").expect("valid text regex"));
static NEW_DOC_PAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(newdoc|newpar)(?:\s+id\s*=\s*(.+))?\s*$").expect("valid newdoc regex")
});

/// The id in a `sent_id = ...` comment line (without the leading `#`)
pub(crate) fn sent_id_of(comment: &str) -> Option<&str> {
    SENT_ID_RE
        .captures(comment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// True if `zone` is a valid zone name (`en`, `cs_udpipe`, `und`, ...)
pub fn is_valid_zone(zone: &str) -> bool {
    ZONE_RE.is_match(zone)
}

/// Which end of a sorted selection to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extreme {
    First,
    Last,
}

/// Modifiers for [`Tree::children`] and [`Tree::descendants`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Select {
    /// Include the node itself
    pub add_self: bool,
    /// Return only the node with the lowest or highest ord
    pub extreme: Option<Extreme>,
}

impl Select {
    pub const ALL: Select = Select {
        add_self: false,
        extreme: None,
    };

    pub const WITH_SELF: Select = Select {
        add_self: true,
        extreme: None,
    };

    pub fn add_self(mut self) -> Self {
        self.add_self = true;
        self
    }

    pub fn first_only(mut self) -> Self {
        self.extreme = Some(Extreme::First);
        self
    }

    pub fn last_only(mut self) -> Self {
        self.extreme = Some(Extreme::Last);
        self
    }
}

/// A dependency tree (sentence)
#[derive(Debug)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) order: Vec<NodeId>,
    pub(crate) multiwords: Vec<Mwt>,
    pub(crate) empty_nodes: Vec<EmptyNode>,
    zone: String,
    comments: Vec<String>,
    sentence: Option<String>,
    sent_id: Option<String>,
    new_doc: Option<Option<String>>,
    new_par: Option<Option<String>>,
}

impl Tree {
    /// Create an empty tree; the technical root takes the next document id
    pub fn new(ids: &mut IdGenerator) -> Self {
        Self {
            nodes: vec![Node::root(ids.next_id())],
            order: Vec::new(),
            multiwords: Vec::new(),
            empty_nodes: Vec::new(),
            zone: DEFAULT_ZONE.to_string(),
            comments: Vec::new(),
            sentence: None,
            sent_id: None,
            new_doc: None,
            new_par: None,
        }
    }

    /// The technical root
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Get a node by id
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Get a mutable reference to a node by id
    ///
    /// Only attributes are writable; structure changes go through [`crate::edit`].
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Get a node by id, panicking on ids that did not come from this tree
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// All live words in word order
    pub fn words(&self) -> &[NodeId] {
        &self.order
    }

    /// The word at a 1-based position
    pub fn word_at(&self, ord: usize) -> Option<NodeId> {
        ord.checked_sub(1).and_then(|i| self.order.get(i)).copied()
    }

    /// Number of live words
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ord(&self, id: NodeId) -> usize {
        self.nodes[id.0].ord
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// True if `id` names a node of this tree that has not been removed
    pub fn is_live(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|node| !node.removed)
    }

    /// Iterate the child chain of a node (first child, then next siblings)
    pub fn child_chain(&self, id: NodeId) -> ChildChain<'_> {
        ChildChain {
            tree: self,
            next: self.nodes[id.0].first_child,
        }
    }

    /// Children of a node, sorted by ord unless an extreme is selected
    pub fn children(&self, id: NodeId, select: Select) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = self.child_chain(id).collect();
        if select.add_self {
            result.push(id);
        }
        self.finish_selection(result, select.extreme)
    }

    /// Descendants of a node, sorted by ord unless an extreme is selected
    pub fn descendants(&self, id: NodeId, select: Select) -> Vec<NodeId> {
        self.descendants_except(id, select, None)
    }

    /// Descendants of a node, skipping the whole subtree of `except`
    ///
    /// If `except` is the node itself the result is empty.
    pub fn descendants_except(
        &self,
        id: NodeId,
        select: Select,
        except: Option<NodeId>,
    ) -> Vec<NodeId> {
        if except == Some(id) {
            return Vec::new();
        }
        // The root's descendants are the whole word order, already sorted.
        if id.is_root() && except.is_none() && select.extreme.is_none() {
            let mut result = Vec::with_capacity(self.order.len() + 1);
            if select.add_self {
                result.push(id);
            }
            result.extend_from_slice(&self.order);
            return result;
        }

        let mut result = self.subtree(id, except);
        if select.add_self {
            result.push(id);
        }
        self.finish_selection(result, select.extreme)
    }

    /// Depth-first walk over the linked topology, excluding `id` itself
    pub(crate) fn subtree(&self, id: NodeId, except: Option<NodeId>) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = Vec::new();
        if let Some(first) = self.nodes[id.0].first_child {
            stack.push(first);
        }
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current.0];
            if let Some(next) = node.next_sibling {
                stack.push(next);
            }
            if Some(current) == except {
                continue;
            }
            result.push(current);
            if let Some(first) = node.first_child {
                stack.push(first);
            }
        }
        result
    }

    fn finish_selection(&self, mut ids: Vec<NodeId>, extreme: Option<Extreme>) -> Vec<NodeId> {
        match extreme {
            Some(Extreme::First) => ids
                .into_iter()
                .min_by_key(|id| self.ord(*id))
                .into_iter()
                .collect(),
            Some(Extreme::Last) => ids
                .into_iter()
                .max_by_key(|id| self.ord(*id))
                .into_iter()
                .collect(),
            None => {
                ids.sort_unstable_by_key(|id| self.ord(*id));
                ids
            }
        }
    }

    /// `a` comes before `b` in word order; the root precedes every word
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        self.ord(a) < self.ord(b)
    }

    /// `a` lies strictly below `b`
    pub fn is_descendant_of(&self, a: NodeId, b: NodeId) -> bool {
        if self.nodes[b.0].first_child.is_none() {
            return false;
        }
        let mut current = self.nodes[a.0].parent;
        while let Some(p) = current {
            if p == b {
                return true;
            }
            current = self.nodes[p.0].parent;
        }
        false
    }

    /// Other children of the same parent, sorted by ord
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => {
                let mut result = self.children(parent, Select::ALL);
                result.retain(|s| *s != id);
                result
            }
            None => Vec::new(),
        }
    }

    /// The sibling immediately to the left in word order
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let children = self.children(parent, Select::ALL);
        let pos = children.iter().position(|c| *c == id)?;
        pos.checked_sub(1).map(|p| children[p])
    }

    /// The sibling immediately to the right in word order
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let children = self.children(parent, Select::ALL);
        let pos = children.iter().position(|c| *c == id)?;
        children.get(pos + 1).copied()
    }

    /// The following word; the root is followed by the first word
    pub fn next_node(&self, id: NodeId) -> Option<NodeId> {
        self.order.get(self.ord(id)).copied()
    }

    /// The preceding word; the first word is preceded by the root
    pub fn prev_node(&self, id: NodeId) -> Option<NodeId> {
        match self.ord(id) {
            0 => None,
            1 => Some(NodeId::ROOT),
            ord => Some(self.order[ord - 2]),
        }
    }

    /// `bundle/zone`, or `?/zone` without a bundle id
    pub fn address(&self, bundle_id: Option<&str>) -> String {
        let prefix = bundle_id.or(self.sent_id.as_deref()).unwrap_or("?");
        format!("{}/{}", prefix, self.zone)
    }

    /// `bundle/zone#ord`
    pub fn node_address(&self, bundle_id: Option<&str>, id: NodeId) -> String {
        format!("{}#{}", self.address(bundle_id), self.ord(id))
    }

    /// Render a DEPS value using current word order
    pub fn format_deps(&self, deps: &EnhancedDeps) -> String {
        if let Some(raw) = deps.raw() {
            return raw.to_string();
        }
        if deps.items().is_empty() {
            return "_".to_string();
        }
        deps.items()
            .iter()
            .map(|dep| match dep.governor {
                Governor::Root => format!("0:{}", dep.rel),
                Governor::Node(id) => format!("{}:{}", self.ord(id), dep.rel),
                Governor::Empty(anchor, sub) => {
                    let ord = anchor.map_or(0, |a| self.ord(a));
                    format!("{}.{}:{}", ord, sub, dep.rel)
                }
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    // ===== Multiword tokens and empty nodes =====

    pub fn multiwords(&self) -> &[Mwt] {
        &self.multiwords
    }

    /// Bind consecutive words to one surface form
    pub fn add_multiword(&mut self, words: Vec<NodeId>, form: &str, misc: Option<&str>) -> usize {
        let index = self.multiwords.len();
        for word in &words {
            self.nodes[word.0].mwt = Some(index);
        }
        self.multiwords.push(Mwt {
            form: form.to_string(),
            feats: None,
            misc: misc.map(str::to_string),
            words,
        });
        index
    }

    /// Current `first-last` ord range of a multiword token
    pub fn mwt_range(&self, index: usize) -> Option<(usize, usize)> {
        let mwt = self.multiwords.get(index)?;
        let first = mwt.words.iter().map(|w| self.ord(*w)).min()?;
        let last = mwt.words.iter().map(|w| self.ord(*w)).max()?;
        Some((first, last))
    }

    pub fn empty_nodes(&self) -> &[EmptyNode] {
        &self.empty_nodes
    }

    pub fn add_empty_node(&mut self, node: EmptyNode) {
        self.empty_nodes.push(node);
    }

    // ===== Sentence metadata =====

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn set_zone(&mut self, zone: &str) {
        self.zone = zone.to_string();
    }

    /// Comment lines without the leading `#`, in input order
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Append a comment line (without the leading `#`)
    ///
    /// `sent_id`, `text`, `newdoc` and `newpar` comments also set the
    /// matching metadata field.
    pub fn add_comment(&mut self, comment: &str) {
        if let Some(caps) = SENT_ID_RE.captures(comment) {
            self.sent_id = Some(caps[1].to_string());
        } else if let Some(caps) = TEXT_RE.captures(comment) {
            self.sentence = Some(caps[1].to_string());
        } else if let Some(caps) = NEW_DOC_PAR_RE.captures(comment) {
            let id = caps.get(2).map(|m| m.as_str().trim().to_string());
            if &caps[1] == "newdoc" {
                self.new_doc = Some(id);
            } else {
                self.new_par = Some(id);
            }
        }
        self.comments.push(comment.to_string());
    }

    pub fn sentence(&self) -> Option<&str> {
        self.sentence.as_deref()
    }

    /// Set the sentence text, updating the `text` comment in place
    pub fn set_sentence(&mut self, text: &str) {
        self.sentence = Some(text.to_string());
        self.replace_comment(&TEXT_RE, format!(" text = {}", text));
    }

    pub fn sent_id(&self) -> Option<&str> {
        self.sent_id.as_deref()
    }

    /// Set the sentence id, updating the `sent_id` comment in place
    pub fn set_sent_id(&mut self, sent_id: &str) {
        self.sent_id = Some(sent_id.to_string());
        self.replace_comment(&SENT_ID_RE, format!(" sent_id = {}", sent_id));
    }

    /// `Some(id)` if this tree starts a new document
    pub fn new_doc(&self) -> Option<Option<&str>> {
        self.new_doc.as_ref().map(|id| id.as_deref())
    }

    /// `Some(id)` if this tree starts a new paragraph
    pub fn new_par(&self) -> Option<Option<&str>> {
        self.new_par.as_ref().map(|id| id.as_deref())
    }

    /// Deep copy with fresh document ids
    ///
    /// Word order, topology, attributes, multiword tokens, empty nodes and
    /// metadata all carry over. Removed nodes are left behind.
    pub fn copy_tree(&self, ids: &mut IdGenerator) -> Tree {
        let mut copy = Tree::new(ids);
        copy.zone = self.zone.clone();
        copy.comments = self.comments.clone();
        copy.sentence = self.sentence.clone();
        copy.sent_id = self.sent_id.clone();
        copy.new_doc = self.new_doc.clone();
        copy.new_par = self.new_par.clone();

        // Live words land in the new arena in word order.
        let mut mapping = vec![None; self.nodes.len()];
        mapping[NodeId::ROOT.0] = Some(NodeId::ROOT);
        for (i, id) in self.order.iter().enumerate() {
            mapping[id.0] = Some(NodeId(i + 1));
        }
        let remap = |id: NodeId| mapping.get(id.0).copied().flatten();
        let copy_deps = |deps: &EnhancedDeps| {
            if deps.raw().is_some() {
                return deps.clone();
            }
            let items = deps
                .items()
                .iter()
                .filter_map(|dep| {
                    let governor = match dep.governor {
                        Governor::Root => Governor::Root,
                        Governor::Node(g) => Governor::Node(remap(g)?),
                        Governor::Empty(None, sub) => Governor::Empty(None, sub),
                        Governor::Empty(Some(a), sub) => Governor::Empty(Some(remap(a)?), sub),
                    };
                    Some(EnhancedDep {
                        governor,
                        rel: dep.rel.clone(),
                    })
                })
                .collect();
            EnhancedDeps::new(items)
        };

        for (i, id) in self.order.iter().enumerate() {
            let source = &self.nodes[id.0];
            copy.nodes.push(Node {
                uid: ids.next_id(),
                ord: i + 1,
                parent: None,
                first_child: None,
                next_sibling: None,
                deps: copy_deps(&source.deps),
                ..source.clone()
            });
            copy.order.push(NodeId(i + 1));
        }

        for id in std::iter::once(NodeId::ROOT).chain(self.order.iter().copied()) {
            let Some(parent) = remap(id) else { continue };
            let children: Vec<NodeId> = self.child_chain(id).filter_map(remap).collect();
            // Linking prepends, so go backwards to keep the chain order.
            for child in children.into_iter().rev() {
                copy.link(child, parent);
            }
        }

        copy.multiwords = self
            .multiwords
            .iter()
            .map(|mwt| Mwt {
                words: mwt.words.iter().copied().filter_map(remap).collect(),
                ..mwt.clone()
            })
            .collect();
        copy.empty_nodes = self
            .empty_nodes
            .iter()
            .map(|empty| EmptyNode {
                anchor: empty.anchor.and_then(remap),
                deps: copy_deps(&empty.deps),
                ..empty.clone()
            })
            .collect();
        copy
    }

    fn replace_comment(&mut self, pattern: &Regex, line: String) {
        if let Some(existing) = self.comments.iter_mut().find(|c| pattern.is_match(c)) {
            *existing = line;
            return;
        }
        // New metadata goes after any newdoc/newpar markers.
        let pos = self
            .comments
            .iter()
            .position(|c| !NEW_DOC_PAR_RE.is_match(c))
            .unwrap_or(self.comments.len());
        self.comments.insert(pos, line);
    }
}

/// Iterator over a node's child chain
pub struct ChildChain<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for ChildChain<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.nodes[current.0].next_sibling;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> runs(3) -> {dog(2) -> The(1), .(4)}
    fn sample() -> (Tree, Vec<NodeId>) {
        let mut ids = IdGenerator::default();
        let mut tree = Tree::new(&mut ids);
        let the = tree.create_child(&mut ids, NodeId::ROOT).unwrap();
        let dog = tree.create_child(&mut ids, NodeId::ROOT).unwrap();
        let runs = tree.create_child(&mut ids, NodeId::ROOT).unwrap();
        let dot = tree.create_child(&mut ids, NodeId::ROOT).unwrap();
        tree.set_parent(the, dog, false).unwrap();
        tree.set_parent(dog, runs, false).unwrap();
        tree.set_parent(dot, runs, false).unwrap();
        for (id, form) in [(the, "The"), (dog, "dog"), (runs, "runs"), (dot, ".")] {
            tree.node_mut(id).form = Some(form.to_string());
        }
        (tree, vec![the, dog, runs, dot])
    }

    #[test]
    fn test_tree_creation() {
        let (tree, nodes) = sample();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.ord(NodeId::ROOT), 0);
        assert_eq!(tree.words(), nodes.as_slice());
        assert_eq!(tree.parent(nodes[2]), Some(NodeId::ROOT));
        assert_eq!(tree.parent(nodes[0]), Some(nodes[1]));
        assert_eq!(tree.zone(), DEFAULT_ZONE);
    }

    #[test]
    fn test_children_sorted() {
        let (tree, n) = sample();
        assert_eq!(tree.children(n[2], Select::ALL), vec![n[1], n[3]]);
        assert_eq!(tree.children(n[2], Select::WITH_SELF), vec![n[1], n[2], n[3]]);
        assert_eq!(tree.children(n[2], Select::ALL.first_only()), vec![n[1]]);
        assert_eq!(tree.children(n[2], Select::ALL.last_only()), vec![n[3]]);
        assert!(tree.children(n[0], Select::ALL).is_empty());
        assert!(tree.children(n[0], Select::ALL.first_only()).is_empty());
    }

    #[test]
    fn test_descendants() {
        let (tree, n) = sample();
        assert_eq!(tree.descendants(n[2], Select::ALL), vec![n[0], n[1], n[3]]);
        assert_eq!(
            tree.descendants(n[2], Select::WITH_SELF),
            vec![n[0], n[1], n[2], n[3]]
        );
        assert_eq!(tree.descendants(n[2], Select::ALL.last_only()), vec![n[3]]);
        assert_eq!(tree.descendants(n[1], Select::ALL), vec![n[0]]);
        assert_eq!(tree.descendants(NodeId::ROOT, Select::ALL), n);
        assert_eq!(
            tree.descendants(NodeId::ROOT, Select::WITH_SELF.first_only()),
            vec![NodeId::ROOT]
        );
    }

    #[test]
    fn test_descendants_except() {
        let (tree, n) = sample();
        assert_eq!(
            tree.descendants_except(n[2], Select::ALL, Some(n[1])),
            vec![n[3]]
        );
        assert_eq!(
            tree.descendants_except(NodeId::ROOT, Select::ALL, Some(n[1])),
            vec![n[2], n[3]]
        );
        assert!(
            tree.descendants_except(n[2], Select::WITH_SELF, Some(n[2]))
                .is_empty()
        );
    }

    #[test]
    fn test_precedes_and_descendant_of() {
        let (tree, n) = sample();
        assert!(tree.precedes(n[0], n[1]));
        assert!(!tree.precedes(n[1], n[0]));
        assert!(tree.precedes(NodeId::ROOT, n[0]));
        assert!(!tree.precedes(n[0], NodeId::ROOT));
        assert!(!tree.precedes(NodeId::ROOT, NodeId::ROOT));

        assert!(tree.is_descendant_of(n[0], n[2]));
        assert!(tree.is_descendant_of(n[0], NodeId::ROOT));
        assert!(!tree.is_descendant_of(n[2], n[0]));
        assert!(!tree.is_descendant_of(n[2], n[2]));
        assert!(!tree.is_descendant_of(NodeId::ROOT, n[2]));
    }

    #[test]
    fn test_neighbours() {
        let (tree, n) = sample();
        assert_eq!(tree.next_node(NodeId::ROOT), Some(n[0]));
        assert_eq!(tree.next_node(n[0]), Some(n[1]));
        assert_eq!(tree.next_node(n[3]), None);
        assert_eq!(tree.prev_node(n[0]), Some(NodeId::ROOT));
        assert_eq!(tree.prev_node(n[2]), Some(n[1]));
        assert_eq!(tree.prev_node(NodeId::ROOT), None);

        assert_eq!(tree.siblings(n[1]), vec![n[3]]);
        assert_eq!(tree.prev_sibling(n[3]), Some(n[1]));
        assert_eq!(tree.next_sibling(n[1]), Some(n[3]));
        assert_eq!(tree.next_sibling(n[3]), None);
        assert!(tree.siblings(NodeId::ROOT).is_empty());
    }

    #[test]
    fn test_sent_id_comment_forms() {
        assert_eq!(sent_id_of(" sent_id = s1"), Some("s1"));
        assert_eq!(sent_id_of(" sent_id=s2/en"), Some("s2/en"));
        assert_eq!(sent_id_of(" sent_id s3"), Some("s3"));
        assert_eq!(sent_id_of(" sent_idx = 7"), None);
        assert_eq!(sent_id_of(" sent_id_old = 7"), None);

        let mut ids = IdGenerator::default();
        let mut tree = Tree::new(&mut ids);
        tree.add_comment(" sent_idx = 7");
        assert_eq!(tree.sent_id(), None);
    }

    #[test]
    fn test_metadata_comments() {
        let mut ids = IdGenerator::default();
        let mut tree = Tree::new(&mut ids);
        tree.add_comment(" newdoc id = d1");
        tree.add_comment(" sent_id = s1/en");
        tree.add_comment(" text = The dog runs.");
        tree.add_comment(" translator = someone");

        assert_eq!(tree.new_doc(), Some(Some("d1")));
        assert_eq!(tree.new_par(), None);
        assert_eq!(tree.sent_id(), Some("s1/en"));
        assert_eq!(tree.sentence(), Some("The dog runs."));
        assert_eq!(tree.comments().len(), 4);

        tree.set_sentence("The cat runs.");
        assert_eq!(tree.comments()[2], " text = The cat runs.");
        assert_eq!(tree.sentence(), Some("The cat runs."));
    }

    #[test]
    fn test_set_metadata_inserts_after_markers() {
        let mut ids = IdGenerator::default();
        let mut tree = Tree::new(&mut ids);
        tree.add_comment(" newpar");
        tree.add_comment(" note");
        tree.set_sent_id("s9");

        assert_eq!(tree.new_par(), Some(None));
        assert_eq!(
            tree.comments(),
            &[" newpar".to_string(), " sent_id = s9".to_string(), " note".to_string()]
        );
    }

    #[test]
    fn test_zone_validation() {
        assert!(is_valid_zone("en"));
        assert!(is_valid_zone("und"));
        assert!(is_valid_zone("cs_udpipe"));
        assert!(is_valid_zone(""));
        assert!(!is_valid_zone("EN"));
        assert!(!is_valid_zone("en us"));
    }

    #[test]
    fn test_format_deps() {
        let (mut tree, n) = sample();
        let mut deps = EnhancedDeps::default();
        assert_eq!(tree.format_deps(&deps), "_");
        deps.push(Governor::Root, "root");
        deps.push(Governor::Node(n[1]), "nmod:poss");
        assert_eq!(tree.format_deps(&deps), "0:root|2:nmod:poss");
        tree.node_mut(n[0]).deps = deps;
    }

    #[test]
    fn test_copy_tree() {
        let (mut tree, n) = sample();
        tree.add_comment(" sent_id = s1");
        tree.node_mut(n[0]).deps.push(Governor::Node(n[1]), "det");
        tree.node_mut(n[0]).deps.push(Governor::Empty(Some(n[2]), 1), "dep");
        tree.add_multiword(vec![n[2], n[3]], "runs.", None);

        let mut ids = IdGenerator::default();
        for _ in 0..100 {
            ids.next_id();
        }
        let mut copy = tree.copy_tree(&mut ids);

        assert_eq!(copy.len(), 4);
        assert_eq!(copy.sent_id(), Some("s1"));
        for (a, b) in tree.words().iter().zip(copy.words()) {
            assert_eq!(tree.node(*a).form, copy.node(*b).form);
            assert_eq!(tree.ord(*a), copy.ord(*b));
            assert!(copy.node(*b).uid() > 100);
        }
        let c = copy.words().to_vec();
        assert_eq!(copy.parent(c[0]), Some(c[1]));
        assert_eq!(copy.children(c[2], Select::ALL), vec![c[1], c[3]]);
        assert_eq!(copy.format_deps(&copy.node(c[0]).deps), "2:det|3.1:dep");
        assert_eq!(
            copy.node(c[0]).deps.items()[1].governor,
            Governor::Empty(Some(c[2]), 1)
        );
        assert_eq!(copy.mwt_range(0), Some((3, 4)));

        copy.node_mut(c[0]).form = Some("A".to_string());
        copy.set_parent(c[3], NodeId::ROOT, false).unwrap();
        assert_eq!(tree.node(n[0]).form.as_deref(), Some("The"));
        assert_eq!(tree.parent(n[3]), Some(n[2]));
    }

    #[test]
    fn test_address() {
        let (tree, n) = sample();
        assert_eq!(tree.address(Some("s1")), "s1/und");
        assert_eq!(tree.node_address(Some("s1"), n[2]), "s1/und#3");
        assert_eq!(tree.address(None), "?/und");
    }
}
