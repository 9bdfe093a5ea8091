//! CoNLL-U file parsing
//!
//! Reads CoNLL-U text into [`Document`]s. Reading happens in three stages:
//!
//! 1. split the input into the raw lines of each sentence
//! 2. decode each sentence's lines into columns (pure, so it can run on a
//!    worker thread when [`ReaderOptions::parallel`] is set)
//! 3. build the tree: create every word in file order, then link parents by
//!    declared HEAD id in a second pass
//!
//! Stage 3 always runs on the calling thread, since it draws node ids from
//! the document. Multiword tokens, empty nodes, enhanced dependencies and
//! sentence metadata are all kept.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bstr::ByteSlice;
use flate2::read::MultiGzDecoder;
use pariter::IteratorExt as _;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::{debug, trace};

use crate::bytes::{bs_atoi, bs_split_once, is_blank, split_columns, trim_eol};
use crate::document::{Bundle, Document, IdGenerator};
use crate::node::{EmptyNode, EnhancedDep, EnhancedDeps, Governor, NodeId};
use crate::tree::{DEFAULT_ZONE, Tree, is_valid_zone, sent_id_of};

/// Error during CoNLL-U parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Parse error at line {line_num}: {message}")]
pub struct ParseError {
    pub line_num: usize,
    pub message: String,
}

impl ParseError {
    fn new(line_num: usize, message: impl Into<String>) -> Self {
        Self {
            line_num,
            message: message.into(),
        }
    }
}

/// Value of the ID column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenId {
    /// A word: `3`
    Single(usize),
    /// A multiword token: `3-4`
    Range(usize, usize),
    /// An empty node: `3.1`
    Decimal(usize, usize),
}

/// Parse ID field (integer, range, or decimal)
pub fn parse_id(s: &[u8]) -> Option<TokenId> {
    if let Some((first, last)) = bs_split_once(s, b'-') {
        Some(TokenId::Range(bs_atoi(first)?, bs_atoi(last)?))
    } else if let Some((main, sub)) = bs_split_once(s, b'.') {
        Some(TokenId::Decimal(bs_atoi(main)?, bs_atoi(sub)?))
    } else {
        bs_atoi(s).map(TokenId::Single)
    }
}

/// Reader settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Put every tree in this zone, whatever its sent_id says
    pub zone: Option<String>,
    /// Start a new document after this many bundles (0: one document for all input)
    pub bundles_per_doc: usize,
    /// Decode sentences on worker threads
    pub parallel: bool,
}

/// The raw lines of one sentence, with their line numbers
#[derive(Debug, Default)]
pub struct RawSentence {
    lines: Vec<(usize, Vec<u8>)>,
}

/// Splits a byte stream at blank lines
struct SentenceBlocks<R> {
    input: R,
    line_num: usize,
    done: bool,
}

impl<R: BufRead> SentenceBlocks<R> {
    fn new(input: R) -> Self {
        Self {
            input,
            line_num: 0,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for SentenceBlocks<R> {
    type Item = Result<RawSentence, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut sentence = RawSentence::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.input.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.done = true;
                    return (!sentence.lines.is_empty()).then_some(Ok(sentence));
                }
                Ok(_) => {
                    self.line_num += 1;
                    if is_blank(&buf) {
                        if !sentence.lines.is_empty() {
                            return Some(Ok(sentence));
                        }
                        // Skip multiple blank lines
                        continue;
                    }
                    sentence.lines.push((self.line_num, trim_eol(&buf).to_vec()));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(ParseError::new(
                        self.line_num + 1,
                        format!("IO error: {}", e),
                    )));
                }
            }
        }
    }
}

#[derive(Debug)]
struct WordLine {
    line_num: usize,
    id: usize,
    form: Option<String>,
    lemma: Option<String>,
    upos: Option<String>,
    xpos: Option<String>,
    feats: Option<String>,
    head: Option<String>,
    deprel: Option<String>,
    deps: Option<String>,
    misc: Option<String>,
}

#[derive(Debug)]
struct RangeLine {
    line_num: usize,
    first: usize,
    last: usize,
    form: String,
    feats: Option<String>,
    misc: Option<String>,
}

#[derive(Debug)]
struct EmptyLine {
    line_num: usize,
    anchor: usize,
    deps: Option<String>,
    node: EmptyNode,
}

/// A sentence with every line decoded, not yet turned into a tree
#[derive(Debug)]
pub struct ParsedSentence {
    first_line: usize,
    comments: Vec<String>,
    words: Vec<WordLine>,
    ranges: Vec<RangeLine>,
    empties: Vec<EmptyLine>,
}

fn utf8(bytes: &[u8], line_num: usize) -> Result<&str, ParseError> {
    bytes
        .to_str()
        .map_err(|e| ParseError::new(line_num, format!("Invalid UTF-8: {}", e)))
}

/// A column value, `None` for `_`
fn column(bytes: &[u8], line_num: usize) -> Result<Option<String>, ParseError> {
    if bytes == b"_" {
        Ok(None)
    } else {
        Ok(Some(utf8(bytes, line_num)?.to_string()))
    }
}

/// Decode the lines of one sentence
pub fn parse_sentence(raw: RawSentence) -> Result<ParsedSentence, ParseError> {
    let mut sentence = ParsedSentence {
        first_line: raw.lines.first().map_or(0, |(n, _)| *n),
        comments: Vec::new(),
        words: Vec::with_capacity(raw.lines.len()),
        ranges: Vec::new(),
        empties: Vec::new(),
    };

    for (line_num, line) in &raw.lines {
        let line_num = *line_num;
        if let Some(comment) = line.strip_prefix(b"#") {
            sentence
                .comments
                .push(utf8(comment, line_num)?.to_string());
            continue;
        }

        let fields = split_columns(line).map_err(|found| {
            ParseError::new(line_num, format!("Expected 10 fields, found {}", found))
        })?;
        let id = parse_id(fields[0]).ok_or_else(|| {
            ParseError::new(
                line_num,
                format!("Invalid ID: {}", String::from_utf8_lossy(fields[0])),
            )
        })?;

        match id {
            TokenId::Single(id) => sentence.words.push(WordLine {
                line_num,
                id,
                form: column(fields[1], line_num)?,
                lemma: column(fields[2], line_num)?,
                upos: column(fields[3], line_num)?,
                xpos: column(fields[4], line_num)?,
                feats: column(fields[5], line_num)?,
                head: column(fields[6], line_num)?,
                deprel: column(fields[7], line_num)?,
                deps: column(fields[8], line_num)?,
                misc: column(fields[9], line_num)?,
            }),
            TokenId::Range(first, last) => {
                if first > last {
                    return Err(ParseError::new(
                        line_num,
                        format!("Invalid range: {}-{}", first, last),
                    ));
                }
                sentence.ranges.push(RangeLine {
                    line_num,
                    first,
                    last,
                    form: utf8(fields[1], line_num)?.to_string(),
                    feats: column(fields[5], line_num)?,
                    misc: column(fields[9], line_num)?,
                });
            }
            TokenId::Decimal(anchor, sub) => sentence.empties.push(EmptyLine {
                line_num,
                anchor,
                deps: column(fields[8], line_num)?,
                node: EmptyNode {
                    anchor: None,
                    sub,
                    form: column(fields[1], line_num)?,
                    lemma: column(fields[2], line_num)?,
                    upos: column(fields[3], line_num)?,
                    xpos: column(fields[4], line_num)?,
                    feats: column(fields[5], line_num)?,
                    deps: EnhancedDeps::default(),
                    misc: column(fields[9], line_num)?,
                },
            }),
        }
    }

    Ok(sentence)
}

impl ParsedSentence {
    /// The `sent_id` comment value, if any
    pub fn sent_id(&self) -> Option<&str> {
        self.comments.iter().find_map(|c| sent_id_of(c))
    }

    /// Build the tree, drawing node ids from `ids`
    pub fn into_tree(self, ids: &mut IdGenerator) -> Result<Tree, ParseError> {
        let mut tree = Tree::new(ids);
        for comment in &self.comments {
            tree.add_comment(comment);
        }

        // First pass: every word exists before any parent is linked.
        let mut by_id: FxHashMap<usize, NodeId> = FxHashMap::default();
        let mut links = Vec::with_capacity(self.words.len());
        for word in self.words {
            let node_id = tree.push_detached(ids);
            if by_id.insert(word.id, node_id).is_some() {
                return Err(ParseError::new(
                    word.line_num,
                    format!("Duplicate word id {}", word.id),
                ));
            }
            let node = tree.node_mut(node_id);
            node.form = word.form;
            node.lemma = word.lemma;
            node.upos = word.upos;
            node.xpos = word.xpos;
            node.feats = word.feats;
            node.deprel = word.deprel;
            node.misc = word.misc;
            links.push((node_id, word.line_num, word.head.clone(), word.deps));
            node.head = word.head;
        }

        let empty_ids: FxHashSet<(usize, usize)> =
            self.empties.iter().map(|e| (e.anchor, e.node.sub)).collect();

        // Second pass: resolve HEAD and DEPS against declared ids.
        for (node_id, line_num, head, deps) in links {
            let parent = match head.as_deref() {
                None => NodeId::ROOT,
                Some(h) => match bs_atoi(h.as_bytes()) {
                    Some(0) => NodeId::ROOT,
                    Some(h) => *by_id.get(&h).ok_or_else(|| {
                        ParseError::new(line_num, format!("HEAD {} does not match any word", h))
                    })?,
                    None => {
                        return Err(ParseError::new(line_num, format!("Invalid HEAD: {}", h)));
                    }
                },
            };
            tree.set_parent(node_id, parent, false)
                .map_err(|e| ParseError::new(line_num, e.to_string()))?;
            if let Some(deps) = deps {
                tree.node_mut(node_id).deps = resolve_deps(deps, &by_id, &empty_ids);
            }
        }

        for range in self.ranges {
            let words = (range.first..=range.last)
                .map(|i| {
                    by_id.get(&i).copied().ok_or_else(|| {
                        ParseError::new(
                            range.line_num,
                            format!("Range {}-{} covers missing word {}", range.first, range.last, i),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let index = tree.add_multiword(words, &range.form, range.misc.as_deref());
            tree.multiwords[index].feats = range.feats;
        }

        for empty in self.empties {
            let anchor = match empty.anchor {
                0 => None,
                k => Some(*by_id.get(&k).ok_or_else(|| {
                    ParseError::new(
                        empty.line_num,
                        format!("Empty node {}.{} follows missing word", k, empty.node.sub),
                    )
                })?),
            };
            let deps = empty
                .deps
                .map(|deps| resolve_deps(deps, &by_id, &empty_ids))
                .unwrap_or_default();
            tree.add_empty_node(EmptyNode {
                anchor,
                deps,
                ..empty.node
            });
        }

        Ok(tree)
    }
}

/// Resolve `head:rel|head:rel` against word and empty-node ids
///
/// A malformed pair, or a governor that names nothing in the sentence,
/// keeps the whole value verbatim.
fn resolve_deps(
    raw: String,
    by_id: &FxHashMap<usize, NodeId>,
    empty_ids: &FxHashSet<(usize, usize)>,
) -> EnhancedDeps {
    let governor = |head: &str| -> Option<Governor> {
        match parse_id(head.as_bytes())? {
            TokenId::Single(0) => Some(Governor::Root),
            TokenId::Single(h) => by_id.get(&h).map(|node| Governor::Node(*node)),
            TokenId::Decimal(k, sub) if empty_ids.contains(&(k, sub)) => match k {
                0 => Some(Governor::Empty(None, sub)),
                k => by_id.get(&k).map(|node| Governor::Empty(Some(*node), sub)),
            },
            _ => None,
        }
    };

    let mut items = Vec::new();
    for pair in raw.split('|') {
        let Some((head, rel)) = pair.split_once(':') else {
            return EnhancedDeps::unresolved(raw);
        };
        let Some(governor) = governor(head) else {
            return EnhancedDeps::unresolved(raw);
        };
        items.push(EnhancedDep {
            governor,
            rel: rel.to_string(),
        });
    }
    EnhancedDeps::new(items)
}

/// Open a file for buffered reading, decompressing `.gz` files
pub fn open_path(path: &Path) -> std::io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

type Sentences = Box<dyn Iterator<Item = Result<ParsedSentence, ParseError>>>;

/// CoNLL-U reader that iterates over documents
pub struct CoNLLUReader {
    input: Option<Box<dyn BufRead + Send>>,
    sentences: Option<Sentences>,
    options: ReaderOptions,
    pending: Option<Result<ParsedSentence, ParseError>>,
    sentence_no: usize,
}

impl CoNLLUReader {
    /// Create a reader over any buffered input
    pub fn from_reader(input: impl BufRead + Send + 'static) -> Self {
        Self {
            input: Some(Box::new(input)),
            sentences: None,
            options: ReaderOptions::default(),
            pending: None,
            sentence_no: 0,
        }
    }

    /// Create a reader from a string
    pub fn from_str(text: &str) -> Self {
        Self::from_reader(std::io::Cursor::new(text.to_string().into_bytes()))
    }

    /// Create a reader from a file path; `.gz` files are decompressed
    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let input = open_path(path)?;
        debug!(path = %path.display(), "opened CoNLL-U file");
        Ok(Self::from_reader(input))
    }

    /// Set options; must be called before the first read
    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    fn next_sentence(&mut self) -> Option<Result<ParsedSentence, ParseError>> {
        if let Some(sentence) = self.pending.take() {
            return Some(sentence);
        }
        if self.sentences.is_none() {
            let input = self.input.take()?;
            let blocks = SentenceBlocks::new(input);
            let sentences: Sentences = if self.options.parallel {
                Box::new(blocks.parallel_map(|raw| raw.and_then(parse_sentence)))
            } else {
                Box::new(blocks.map(|raw| raw.and_then(parse_sentence)))
            };
            self.sentences = Some(sentences);
        }
        self.sentences.as_mut()?.next()
    }

    /// True if the input holds another sentence (or a pending error)
    pub fn has_more(&mut self) -> bool {
        if self.pending.is_none() {
            self.pending = self.next_sentence();
        }
        self.pending.is_some()
    }

    /// Read the next document; `None` at end of input
    pub fn read_document(&mut self) -> Result<Option<Document>, ParseError> {
        let mut document = Document::new();
        if self.read_into(&mut document)? == 0 {
            return Ok(None);
        }
        Ok(Some(document))
    }

    /// Append bundles to `document`; returns how many were added
    ///
    /// Stops after `bundles_per_doc` new bundles (if set) or at end of input.
    pub fn read_into(&mut self, document: &mut Document) -> Result<usize, ParseError> {
        let mut added = 0;
        while let Some(sentence) = self.next_sentence() {
            let sentence = sentence?;
            self.sentence_no += 1;

            let (bundle_id, zone) = self.locate(&sentence)?;
            let starts_bundle = match (document.bundles().last(), &bundle_id) {
                (Some(last), Some(id)) => last.id() != Some(id.as_str()) || last.has_zone(&zone),
                _ => true,
            };
            if starts_bundle
                && self.options.bundles_per_doc > 0
                && added >= self.options.bundles_per_doc
            {
                self.sentence_no -= 1;
                self.pending = Some(Ok(sentence));
                break;
            }

            let mut tree = sentence.into_tree(document.ids_mut())?;
            tree.set_zone(&zone);
            if starts_bundle {
                let id = bundle_id.or_else(|| Some(self.sentence_no.to_string()));
                document.add_bundle(Bundle::new(id));
                added += 1;
            }
            trace!(words = tree.len(), zone = %zone, "read tree");
            if let Some(bundle) = document.last_bundle_mut() {
                bundle.add_tree(tree);
            }
        }
        debug!(bundles = added, "read document");
        Ok(added)
    }

    /// Bundle id and zone of a sentence, from its sent_id and the options
    fn locate(&self, sentence: &ParsedSentence) -> Result<(Option<String>, String), ParseError> {
        let (bundle_id, zone) = match sentence.sent_id() {
            Some(sent_id) => match sent_id.split_once('/') {
                Some((bundle, zone)) if !zone.is_empty() => {
                    (Some(bundle.to_string()), zone.to_string())
                }
                Some((bundle, _)) => (Some(bundle.to_string()), DEFAULT_ZONE.to_string()),
                None => (Some(sent_id.to_string()), DEFAULT_ZONE.to_string()),
            },
            None => (None, DEFAULT_ZONE.to_string()),
        };
        let zone = self.options.zone.clone().unwrap_or(zone);
        if !is_valid_zone(&zone) {
            return Err(ParseError::new(
                sentence.first_line,
                format!("'{}' is not a valid zone name", zone),
            ));
        }
        Ok((bundle_id, zone))
    }
}

impl Iterator for CoNLLUReader {
    type Item = Result<Document, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_document().transpose()
    }
}
