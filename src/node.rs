//! Word-level records stored in a tree
//!
//! A [`Node`] is one token of a sentence. Nodes live in the arena of their
//! [`Tree`](crate::tree::Tree) and refer to each other through [`NodeId`]s,
//! which are stable indices into that arena. Structural fields (order,
//! parent, children) are only written by the tree's own operations; the
//! linguistic attributes are plain public fields.

/// Index of a node inside its tree's arena
///
/// Ids are never reused within one tree, even after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The technical root of every tree
    pub const ROOT: NodeId = NodeId(0);

    /// Position of this node in the tree's arena
    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == NodeId::ROOT
    }
}

/// Attribute value of the technical root
pub const ROOT_PLACEHOLDER: &str = "<ROOT>";

/// A token in a dependency tree
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) uid: u64,
    pub(crate) ord: usize,
    pub(crate) removed: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) mwt: Option<usize>,

    pub form: Option<String>,
    pub lemma: Option<String>,
    pub upos: Option<String>,
    pub xpos: Option<String>,
    pub feats: Option<String>,
    /// HEAD column as read from input; structure comes from the parent link
    pub head: Option<String>,
    pub deprel: Option<String>,
    pub deps: EnhancedDeps,
    pub misc: Option<String>,
}

impl Node {
    pub(crate) fn new(uid: u64, ord: usize) -> Self {
        Self {
            uid,
            ord,
            removed: false,
            parent: None,
            first_child: None,
            next_sibling: None,
            mwt: None,
            form: None,
            lemma: None,
            upos: None,
            xpos: None,
            feats: None,
            head: None,
            deprel: None,
            deps: EnhancedDeps::default(),
            misc: None,
        }
    }

    pub(crate) fn root(uid: u64) -> Self {
        let placeholder = || Some(ROOT_PLACEHOLDER.to_string());
        Self {
            form: placeholder(),
            lemma: placeholder(),
            upos: placeholder(),
            xpos: placeholder(),
            feats: placeholder(),
            deprel: placeholder(),
            ..Self::new(uid, 0)
        }
    }

    /// Document-wide unique id, assigned at creation
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// Word-order position (0 for the technical root)
    pub fn ord(&self) -> usize {
        self.ord
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// Index of the multiword token this node belongs to
    pub fn mwt(&self) -> Option<usize> {
        self.mwt
    }

    /// Value of a morphological feature
    pub fn feat(&self, key: &str) -> Option<&str> {
        kv_get(self.feats.as_deref(), key)
    }

    /// Set (or with `None`, delete) a morphological feature, keeping features sorted
    pub fn set_feat(&mut self, key: &str, value: Option<&str>) {
        self.feats = kv_set(self.feats.as_deref(), key, value, true);
    }

    /// Value of a MISC attribute
    pub fn misc_value(&self, key: &str) -> Option<&str> {
        kv_get(self.misc.as_deref(), key)
    }

    /// Set (or with `None`, delete) a MISC attribute
    pub fn set_misc_value(&mut self, key: &str, value: Option<&str>) {
        self.misc = kv_set(self.misc.as_deref(), key, value, false);
    }
}

/// Look up `key` in a `key=value|key=value` string
fn kv_get<'a>(s: Option<&'a str>, key: &str) -> Option<&'a str> {
    let s = s.filter(|s| *s != "_")?;
    s.split('|').find_map(|pair| match pair.split_once('=') {
        Some((k, v)) if k == key => Some(v),
        None if pair == key => Some(""),
        _ => None,
    })
}

/// Rewrite a `key=value|...` string with one key changed
///
/// Returns `None` when no pairs are left.
fn kv_set(s: Option<&str>, key: &str, value: Option<&str>, sorted: bool) -> Option<String> {
    let mut pairs: Vec<(String, Option<String>)> = s
        .filter(|s| *s != "_" && !s.is_empty())
        .map(|s| {
            s.split('|')
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (k.to_string(), Some(v.to_string())),
                    None => (pair.to_string(), None),
                })
                .collect()
        })
        .unwrap_or_default();

    match (pairs.iter().position(|(k, _)| k == key), value) {
        (Some(pos), Some(v)) => pairs[pos].1 = Some(v.to_string()),
        (Some(pos), None) => {
            pairs.remove(pos);
        }
        (None, Some(v)) => {
            let entry = (key.to_string(), Some(v.to_string()));
            if sorted {
                let pos = pairs
                    .iter()
                    .position(|(k, _)| k.to_lowercase() > key.to_lowercase())
                    .unwrap_or(pairs.len());
                pairs.insert(pos, entry);
            } else {
                pairs.push(entry);
            }
        }
        (None, None) => {}
    }

    if pairs.is_empty() {
        return None;
    }
    let joined = pairs
        .into_iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{}={}", k, v),
            None => k,
        })
        .collect::<Vec<_>>()
        .join("|");
    Some(joined)
}

/// Governor of an enhanced dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Governor {
    /// The technical root of the tree
    Root,
    Node(NodeId),
    /// An empty node: its anchor word (`None` before the first word) and decimal part
    Empty(Option<NodeId>, usize),
}

/// One enhanced dependency: governor and relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnhancedDep {
    pub governor: Governor,
    pub rel: String,
}

/// The DEPS column of a node
///
/// Holds resolved (governor, relation) pairs. A value with a malformed pair
/// or a governor id that names nothing in the sentence is kept verbatim and
/// takes precedence on output until the pairs are replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnhancedDeps {
    items: Vec<EnhancedDep>,
    raw: Option<String>,
}

impl EnhancedDeps {
    pub fn new(items: Vec<EnhancedDep>) -> Self {
        Self { items, raw: None }
    }

    pub(crate) fn unresolved(raw: String) -> Self {
        Self {
            items: Vec::new(),
            raw: Some(raw),
        }
    }

    pub fn items(&self) -> &[EnhancedDep] {
        &self.items
    }

    /// Verbatim value kept when the input could not be resolved
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.raw.is_none()
    }

    /// Replace all pairs, discarding any verbatim value
    pub fn set(&mut self, items: Vec<EnhancedDep>) {
        self.items = items;
        self.raw = None;
    }

    pub fn push(&mut self, governor: Governor, rel: &str) {
        self.raw = None;
        self.items.push(EnhancedDep {
            governor,
            rel: rel.to_string(),
        });
    }

    /// Drop pairs whose governor fails the predicate; returns how many were dropped
    pub(crate) fn retain_governors(&mut self, mut keep: impl FnMut(Governor) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|dep| keep(dep.governor));
        before - self.items.len()
    }
}

/// A multiword token: one surface form spanning several nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mwt {
    pub form: String,
    pub feats: Option<String>,
    pub misc: Option<String>,
    pub(crate) words: Vec<NodeId>,
}

impl Mwt {
    /// Nodes covered by this token, in input order
    pub fn words(&self) -> &[NodeId] {
        &self.words
    }
}

/// An empty node (decimal id such as `8.1`) kept alongside the tree
///
/// Empty nodes take no part in the tree structure. They are written after
/// their anchor node, or before the first word when the anchor is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyNode {
    pub(crate) anchor: Option<NodeId>,
    pub(crate) sub: usize,
    pub form: Option<String>,
    pub lemma: Option<String>,
    pub upos: Option<String>,
    pub xpos: Option<String>,
    pub feats: Option<String>,
    pub deps: EnhancedDeps,
    pub misc: Option<String>,
}

impl EmptyNode {
    pub fn anchor(&self) -> Option<NodeId> {
        self.anchor
    }

    /// Decimal part of the id
    pub fn sub(&self) -> usize {
        self.sub
    }
}
