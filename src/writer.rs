//! CoNLL-U and plain-text output
//!
//! Trees are formatted into a `String` buffer and written in one call per
//! tree. Word lines follow current word order: the ID column is `ord`, HEAD
//! is the parent's `ord`, and enhanced dependencies are rendered from
//! their governors' current positions. Unset columns are written as `_`.

use std::io::{self, Write};
use std::str::FromStr;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::warn;

use crate::document::Document;
use crate::node::{EmptyNode, NodeId};
use crate::tree::{DEFAULT_ZONE, Tree};

/// Error while writing output
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Sentence {0} is undefined")]
    MissingSentence(String),
}

/// Settings for [`CoNLLUWriter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Add `# sent_id = bundle[/zone]` to trees that have no sent_id comment
    pub print_sent_id: bool,
}

fn field(value: Option<&str>) -> &str {
    value.unwrap_or("_")
}

/// Format one tree as a CoNLL-U block (comments, lines, blank line)
///
/// A tree without words produces nothing.
pub fn format_tree(tree: &Tree, bundle_id: Option<&str>, options: WriterOptions, out: &mut String) {
    if tree.is_empty() {
        return;
    }

    if options.print_sent_id
        && tree.sent_id().is_none()
        && let Some(bundle_id) = bundle_id.filter(|id| !id.is_empty())
    {
        out.push_str("# sent_id = ");
        out.push_str(bundle_id);
        if tree.zone() != DEFAULT_ZONE {
            out.push('/');
            out.push_str(tree.zone());
        }
        out.push('\n');
    }
    for comment in tree.comments() {
        out.push('#');
        out.push_str(comment);
        out.push('\n');
    }

    let mut empties: FxHashMap<Option<NodeId>, Vec<&EmptyNode>> = FxHashMap::default();
    for empty in tree.empty_nodes() {
        empties.entry(empty.anchor()).or_default().push(empty);
    }
    if let Some(leading) = empties.get(&None) {
        for empty in leading {
            format_empty(tree, empty, out);
        }
    }

    for &id in tree.words() {
        let node = tree.node(id);
        let ord = node.ord();

        if let Some(index) = node.mwt()
            && let Some((first, last)) = tree.mwt_range(index)
            && first == ord
        {
            let mwt = &tree.multiwords()[index];
            out.push_str(&format!(
                "{}-{}\t{}\t_\t_\t_\t{}\t_\t_\t_\t{}\n",
                first,
                last,
                mwt.form,
                field(mwt.feats.as_deref()),
                field(mwt.misc.as_deref()),
            ));
        }

        let head = tree.parent(id).map_or(0, |p| tree.ord(p));
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            ord,
            field(node.form.as_deref()),
            field(node.lemma.as_deref()),
            field(node.upos.as_deref()),
            field(node.xpos.as_deref()),
            field(node.feats.as_deref()),
            head,
            field(node.deprel.as_deref()),
            tree.format_deps(&node.deps),
            field(node.misc.as_deref()),
        ));

        if let Some(following) = empties.get(&Some(id)) {
            for empty in following {
                format_empty(tree, empty, out);
            }
        }
    }
    out.push('\n');
}

fn format_empty(tree: &Tree, empty: &EmptyNode, out: &mut String) {
    let anchor = empty.anchor().map_or(0, |a| tree.ord(a));
    out.push_str(&format!(
        "{}.{}\t{}\t{}\t{}\t{}\t{}\t_\t_\t{}\t{}\n",
        anchor,
        empty.sub(),
        field(empty.form.as_deref()),
        field(empty.lemma.as_deref()),
        field(empty.upos.as_deref()),
        field(empty.xpos.as_deref()),
        field(empty.feats.as_deref()),
        tree.format_deps(&empty.deps),
        field(empty.misc.as_deref()),
    ));
}

/// Writes documents as CoNLL-U
pub struct CoNLLUWriter<W: Write> {
    out: W,
    options: WriterOptions,
    buf: String,
}

impl<W: Write> CoNLLUWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            options: WriterOptions::default(),
            buf: String::new(),
        }
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn write_tree(&mut self, tree: &Tree, bundle_id: Option<&str>) -> io::Result<()> {
        self.buf.clear();
        format_tree(tree, bundle_id, self.options, &mut self.buf);
        self.out.write_all(self.buf.as_bytes())
    }

    pub fn write_document(&mut self, document: &Document) -> io::Result<()> {
        for bundle in document.bundles() {
            for tree in bundle.trees() {
                self.write_tree(tree, bundle.id())?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format a whole document as CoNLL-U
pub fn document_to_string(document: &Document, options: WriterOptions) -> String {
    let mut out = String::new();
    for bundle in document.bundles() {
        for tree in bundle.trees() {
            format_tree(tree, bundle.id(), options, &mut out);
        }
    }
    out
}

/// What [`SentencesWriter`] does with a tree that has no sentence text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IfMissing {
    /// Rebuild the text from the word forms
    #[default]
    Detokenize,
    /// Print an empty line
    Empty,
    /// Log a warning and print an empty line
    Warn,
    /// Stop with an error
    Fatal,
}

impl FromStr for IfMissing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detokenize" => Ok(IfMissing::Detokenize),
            "empty" => Ok(IfMissing::Empty),
            "warn" => Ok(IfMissing::Warn),
            "fatal" => Ok(IfMissing::Fatal),
            other => Err(format!(
                "expected detokenize, empty, warn or fatal, got '{}'",
                other
            )),
        }
    }
}

/// Settings for [`SentencesWriter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SentencesOptions {
    pub if_missing: IfMissing,
}

/// Surface text rebuilt from word forms
///
/// Multiword tokens contribute their surface form once. A token is followed
/// by a space unless its MISC has `SpaceAfter=No`.
pub fn detokenize(tree: &Tree) -> String {
    let mut text = String::new();
    let mut covered_until = 0;
    for &id in tree.words() {
        let node = tree.node(id);
        if node.ord() <= covered_until {
            continue;
        }
        let (form, misc) = match node.mwt().and_then(|i| Some((i, tree.mwt_range(i)?))) {
            Some((index, (first, last))) if first == node.ord() => {
                covered_until = last;
                let mwt = &tree.multiwords()[index];
                (mwt.form.as_str(), mwt.misc.as_deref())
            }
            _ => (field(node.form.as_deref()), node.misc.as_deref()),
        };
        text.push_str(form);
        let no_space = misc
            .is_some_and(|m| m.split('|').any(|pair| pair == "SpaceAfter=No"));
        if !no_space {
            text.push(' ');
        }
    }
    text.truncate(text.trim_end().len());
    text
}

/// Writes one line of sentence text per tree
pub struct SentencesWriter<W: Write> {
    out: W,
    options: SentencesOptions,
}

impl<W: Write> SentencesWriter<W> {
    pub fn new(out: W, options: SentencesOptions) -> Self {
        Self { out, options }
    }

    pub fn write_tree(&mut self, tree: &Tree, bundle_id: Option<&str>) -> Result<(), WriteError> {
        let text = match tree.sentence() {
            Some(text) => text.to_string(),
            None => match self.options.if_missing {
                IfMissing::Detokenize => detokenize(tree),
                IfMissing::Empty => String::new(),
                IfMissing::Warn => {
                    warn!(tree = %tree.address(bundle_id), "sentence is undefined");
                    String::new()
                }
                IfMissing::Fatal => {
                    return Err(WriteError::MissingSentence(tree.address(bundle_id)));
                }
            },
        };
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    pub fn write_document(&mut self, document: &Document) -> Result<(), WriteError> {
        for bundle in document.bundles() {
            for tree in bundle.trees() {
                self.write_tree(tree, bundle.id())?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
