//! Processing steps
//!
//! A [`Block`] is one step of a scenario: a reader, a writer or a
//! transformation. The runner in [`crate::scenario`] creates a fresh
//! [`Document`] and passes it through every block in turn, repeating while
//! some reader still has input.
//!
//! The default methods descend document → bundle → tree → node, so a
//! transformation usually overrides only [`Block::process_node`] or
//! [`Block::process_tree`].

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::conllu::{CoNLLUReader, ParseError, ReaderOptions, open_path};
use crate::document::{Bundle, Document, IdGenerator};
use crate::edit::{RemoveOptions, ShiftOptions};
use crate::error::TreeError;
use crate::node::NodeId;
use crate::tree::Tree;
use crate::writer::{CoNLLUWriter, SentencesOptions, SentencesWriter, WriteError, WriterOptions};

/// Error raised by a block
#[derive(Debug, Error)]
pub enum BlockError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Block {0} does not override any process method")]
    Unimplemented(String),

    #[error("{0}")]
    Fatal(String),
}

/// One step of a scenario
pub trait Block {
    /// Name used in scenarios and log messages
    fn name(&self) -> &str;

    /// Called once before the first document
    fn process_start(&mut self) -> Result<(), BlockError> {
        Ok(())
    }

    /// Called once after the last document
    fn process_end(&mut self) -> Result<(), BlockError> {
        Ok(())
    }

    fn before_process_document(&mut self, _document: &mut Document) -> Result<(), BlockError> {
        Ok(())
    }

    fn process_document(&mut self, document: &mut Document) -> Result<(), BlockError> {
        let (ids, bundles) = document.split_mut();
        for (bundle_no, bundle) in bundles.iter_mut().enumerate() {
            self.process_bundle(bundle, ids, bundle_no + 1)?;
        }
        Ok(())
    }

    fn after_process_document(&mut self, _document: &mut Document) -> Result<(), BlockError> {
        Ok(())
    }

    /// `bundle_no` is 1-based within the document
    fn process_bundle(
        &mut self,
        bundle: &mut Bundle,
        ids: &mut IdGenerator,
        _bundle_no: usize,
    ) -> Result<(), BlockError> {
        for tree in bundle.trees_mut() {
            self.process_tree(tree, ids)?;
        }
        Ok(())
    }

    /// Visit every word in word order
    ///
    /// The order is taken before the first call, so words added on the way
    /// are not visited and words removed on the way are skipped.
    fn process_tree(&mut self, tree: &mut Tree, ids: &mut IdGenerator) -> Result<(), BlockError> {
        let words = tree.words().to_vec();
        for node in words {
            if tree.is_live(node) {
                self.process_node(tree, node, ids)?;
            }
        }
        Ok(())
    }

    fn process_node(
        &mut self,
        _tree: &mut Tree,
        _node: NodeId,
        _ids: &mut IdGenerator,
    ) -> Result<(), BlockError> {
        Err(BlockError::Unimplemented(self.name().to_string()))
    }

    /// True if another document should follow the current one
    ///
    /// Readers return whether input remains; other blocks never ask for more.
    fn has_more(&mut self) -> Result<bool, BlockError> {
        Ok(false)
    }
}

/// Where a reader block takes its text from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    /// One input per file, or standard input if there are no files
    pub fn from_files(files: Vec<PathBuf>) -> VecDeque<Input> {
        if files.is_empty() {
            VecDeque::from([Input::Stdin])
        } else {
            files.into_iter().map(Input::File).collect()
        }
    }

    fn open(self) -> Result<Box<dyn BufRead + Send>, BlockError> {
        match self {
            Input::Stdin => Ok(Box::new(io::BufReader::new(io::stdin()))),
            Input::File(path) => {
                debug!(path = %path.display(), "opening input");
                open_path(&path).map_err(|source| BlockError::Open { path, source })
            }
        }
    }
}

/// `read.Conllu`: read CoNLL-U from files or standard input
///
/// Each call fills the document with the next `bundles_per_doc` bundles of
/// the current file (or all of it); a document never spans two files.
pub struct ReadConllu {
    inputs: VecDeque<Input>,
    options: ReaderOptions,
    current: Option<CoNLLUReader>,
}

impl ReadConllu {
    pub fn new(inputs: VecDeque<Input>, options: ReaderOptions) -> Self {
        Self {
            inputs,
            options,
            current: None,
        }
    }

    /// Read from an in-memory string
    pub fn from_str(text: &str, options: ReaderOptions) -> Self {
        Self {
            inputs: VecDeque::new(),
            current: Some(CoNLLUReader::from_str(text).with_options(options.clone())),
            options,
        }
    }

    /// Move to the first input that still has sentences
    fn advance(&mut self) -> Result<bool, BlockError> {
        loop {
            if let Some(reader) = self.current.as_mut()
                && reader.has_more()
            {
                return Ok(true);
            }
            let Some(input) = self.inputs.pop_front() else {
                self.current = None;
                return Ok(false);
            };
            let reader = CoNLLUReader::from_reader(input.open()?);
            self.current = Some(reader.with_options(self.options.clone()));
        }
    }
}

impl Block for ReadConllu {
    fn name(&self) -> &str {
        "read.Conllu"
    }

    fn process_document(&mut self, document: &mut Document) -> Result<(), BlockError> {
        if self.advance()?
            && let Some(reader) = self.current.as_mut()
        {
            let added = reader.read_into(document)?;
            debug!(bundles = added, "read.Conllu");
        }
        Ok(())
    }

    fn has_more(&mut self) -> Result<bool, BlockError> {
        self.advance()
    }
}

/// `read.Sentences`: one tree per input line, with the line as its text
///
/// All input goes into one document. Each tree gets its own bundle,
/// numbered from 1.
pub struct ReadSentences {
    inputs: VecDeque<Input>,
}

impl ReadSentences {
    pub fn new(inputs: VecDeque<Input>) -> Self {
        Self { inputs }
    }
}

impl Block for ReadSentences {
    fn name(&self) -> &str {
        "read.Sentences"
    }

    fn process_document(&mut self, document: &mut Document) -> Result<(), BlockError> {
        let mut line_no = 0;
        while let Some(input) = self.inputs.pop_front() {
            for line in input.open()?.lines() {
                let line = line?;
                line_no += 1;
                let mut tree = Tree::new(document.ids_mut());
                tree.set_sentence(line.trim_end_matches('\r'));
                document
                    .add_bundle(Bundle::new(Some(line_no.to_string())))
                    .add_tree(tree);
            }
        }
        Ok(())
    }
}

/// `write.Conllu`: write every tree as CoNLL-U
pub struct WriteConllu {
    writer: CoNLLUWriter<Box<dyn Write>>,
}

impl WriteConllu {
    pub fn new(out: Box<dyn Write>, options: WriterOptions) -> Self {
        Self {
            writer: CoNLLUWriter::new(out).with_options(options),
        }
    }
}

impl Block for WriteConllu {
    fn name(&self) -> &str {
        "write.Conllu"
    }

    fn process_bundle(
        &mut self,
        bundle: &mut Bundle,
        _ids: &mut IdGenerator,
        _bundle_no: usize,
    ) -> Result<(), BlockError> {
        for tree in bundle.trees() {
            self.writer.write_tree(tree, bundle.id())?;
        }
        Ok(())
    }

    fn after_process_document(&mut self, _document: &mut Document) -> Result<(), BlockError> {
        Ok(self.writer.flush()?)
    }
}

/// `write.Sentences`: write the text of every tree, one per line
pub struct WriteSentences {
    writer: SentencesWriter<Box<dyn Write>>,
}

impl WriteSentences {
    pub fn new(out: Box<dyn Write>, options: SentencesOptions) -> Self {
        Self {
            writer: SentencesWriter::new(out, options),
        }
    }
}

impl Block for WriteSentences {
    fn name(&self) -> &str {
        "write.Sentences"
    }

    fn process_bundle(
        &mut self,
        bundle: &mut Bundle,
        _ids: &mut IdGenerator,
        _bundle_no: usize,
    ) -> Result<(), BlockError> {
        for tree in bundle.trees() {
            self.writer.write_tree(tree, bundle.id())?;
        }
        Ok(())
    }

    fn after_process_document(&mut self, _document: &mut Document) -> Result<(), BlockError> {
        Ok(self.writer.flush()?)
    }
}

/// `tutorial.DeleteCommas`: remove every word whose lemma is `,`
#[derive(Debug, Default)]
pub struct DeleteCommas;

impl Block for DeleteCommas {
    fn name(&self) -> &str {
        "tutorial.DeleteCommas"
    }

    fn process_node(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _ids: &mut IdGenerator,
    ) -> Result<(), BlockError> {
        if tree.node(node).lemma.as_deref() == Some(",") {
            tree.remove(node, RemoveOptions::WARN)?;
        }
        Ok(())
    }
}

/// `tutorial.ToPositions`: turn prepositions into postpositions
///
/// An adposition that precedes its parent is moved right after the
/// parent's subtree.
#[derive(Debug, Default)]
pub struct ToPositions;

impl Block for ToPositions {
    fn name(&self) -> &str {
        "tutorial.ToPositions"
    }

    fn process_node(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _ids: &mut IdGenerator,
    ) -> Result<(), BlockError> {
        if let Some(parent) = tree.parent(node)
            && tree.node(node).upos.as_deref() == Some("ADP")
            && tree.precedes(node, parent)
        {
            tree.shift_after_subtree(node, parent, ShiftOptions::default())?;
        }
        Ok(())
    }
}

/// `tutorial.RehangPrepositions`: make each adposition the head of its parent
///
/// The adposition takes its parent's place under the grandparent. Words
/// attached directly to the root are left alone.
#[derive(Debug, Default)]
pub struct RehangPrepositions;

impl Block for RehangPrepositions {
    fn name(&self) -> &str {
        "tutorial.RehangPrepositions"
    }

    fn process_node(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _ids: &mut IdGenerator,
    ) -> Result<(), BlockError> {
        if tree.node(node).upos.as_deref() != Some("ADP") {
            return Ok(());
        }
        if let Some(parent) = tree.parent(node)
            && let Some(grandparent) = tree.parent(parent)
        {
            tree.set_parent(node, grandparent, false)?;
            tree.set_parent(parent, node, false)?;
        }
        Ok(())
    }
}

/// `tutorial.Adpositions`: count prepositions and postpositions
///
/// The percentages are written when processing ends.
pub struct Adpositions {
    out: Box<dyn Write>,
    prepositions: usize,
    postpositions: usize,
}

impl Adpositions {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self {
            out,
            prepositions: 0,
            postpositions: 0,
        }
    }
}

impl Block for Adpositions {
    fn name(&self) -> &str {
        "tutorial.Adpositions"
    }

    fn process_node(
        &mut self,
        tree: &mut Tree,
        node: NodeId,
        _ids: &mut IdGenerator,
    ) -> Result<(), BlockError> {
        if tree.node(node).upos.as_deref() == Some("ADP")
            && let Some(parent) = tree.parent(node)
        {
            if tree.precedes(node, parent) {
                self.prepositions += 1;
            } else {
                self.postpositions += 1;
            }
        }
        Ok(())
    }

    fn process_end(&mut self) -> Result<(), BlockError> {
        let all = (self.prepositions + self.postpositions).max(1) as f64;
        writeln!(
            self.out,
            "prepositions {:5.1}%, postpositions {:5.1}%",
            self.prepositions as f64 * 100.0 / all,
            self.postpositions as f64 * 100.0 / all
        )?;
        Ok(self.out.flush()?)
    }
}

/// `util.Normalize`: renumber `ord` from the word order
#[derive(Debug, Default)]
pub struct Normalize;

impl Block for Normalize {
    fn name(&self) -> &str {
        "util.Normalize"
    }

    fn process_tree(&mut self, tree: &mut Tree, _ids: &mut IdGenerator) -> Result<(), BlockError> {
        tree.normalize_order();
        Ok(())
    }
}

/// Number of words in all trees of a document
pub(crate) fn count_words(document: &Document) -> usize {
    document.trees().map(Tree::len).sum()
}
