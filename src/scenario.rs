//! Scenario parsing and execution
//!
//! A scenario is a sequence of blocks, each followed by its parameters:
//!
//! ```text
//! read.Conllu files=in.conllu zone=en   # comments run to the end of the line
//! tutorial.ToPositions
//! write.Conllu print_sent_id=1
//! ```
//!
//! Values may be quoted with `'` or `"`; inside quotes a backslash escapes
//! the next character. Block names are case-insensitive and may use `::`
//! instead of `.`.

use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::LazyLock;

use pest::Parser;
use pest_derive::Parser;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::block::{
    Adpositions, Block, BlockError, DeleteCommas, Input, Normalize, ReadConllu, ReadSentences,
    RehangPrepositions, ToPositions, WriteConllu, WriteSentences, count_words,
};
use crate::conllu::ReaderOptions;
use crate::document::Document;
use crate::tree::is_valid_zone;
use crate::writer::{IfMissing, SentencesOptions, WriterOptions};

#[derive(Parser)]
#[grammar = "scenario.pest"]
struct ScenarioParser;

/// Error while building or running a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario syntax error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Unknown block: {0}")]
    UnknownBlock(String),

    #[error("Block {block}: {message}")]
    BadParam { block: String, message: String },

    #[error("{block}: {source}")]
    Block { block: String, source: BlockError },
}

/// Names of the built-in blocks
pub const BLOCK_NAMES: &[&str] = &[
    "read.Conllu",
    "read.Sentences",
    "write.Conllu",
    "write.Sentences",
    "tutorial.Adpositions",
    "tutorial.DeleteCommas",
    "tutorial.RehangPrepositions",
    "tutorial.ToPositions",
    "util.Normalize",
];

/// A block name with its parameters, as written in a scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub name: String,
    pub params: Vec<(String, String)>,
}

impl BlockSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }
}

/// Written back in scenario syntax
impl fmt::Display for BlockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.params {
            let plain = !value.is_empty()
                && !value
                    .chars()
                    .any(|c| c.is_whitespace() || matches!(c, '\'' | '"' | '#' | '\\'));
            if plain {
                write!(f, " {}={}", key, value)?;
            } else {
                let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
                write!(f, " {}='{}'", key, escaped)?;
            }
        }
        Ok(())
    }
}

/// Parse a scenario string into block specs
pub fn parse_scenario(text: &str) -> Result<Vec<BlockSpec>, ScenarioError> {
    let mut pairs = ScenarioParser::parse(Rule::scenario, text)?;
    let mut specs: Vec<BlockSpec> = Vec::new();

    let Some(scenario) = pairs.next() else {
        return Ok(specs);
    };

    for pair in scenario.into_inner() {
        match pair.as_rule() {
            Rule::block_name => specs.push(BlockSpec::new(pair.as_str())),
            Rule::param => {
                let mut inner = pair.into_inner();
                let (Some(key), Some(value)) = (inner.next(), inner.next()) else {
                    continue;
                };
                let value = match value.as_rule() {
                    Rule::single_quoted | Rule::double_quoted => {
                        unescape(value.into_inner().as_str())
                    }
                    _ => value.as_str().to_string(),
                };
                let Some(spec) = specs.last_mut() else {
                    return Err(ScenarioError::BadParam {
                        block: String::new(),
                        message: format!("parameter '{}' comes before any block", key.as_str()),
                    });
                };
                spec.params.push((key.as_str().to_string(), value));
            }
            Rule::EOI => {} // End of input
            _ => {}
        }
    }

    Ok(specs)
}

/// Drop the backslash in front of every escaped character
fn unescape(quoted: &str) -> String {
    let mut result = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(c);
        }
    }
    result
}

static PARAM_WITH_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^\s=]+)=(.*\s.*)$").expect("valid parameter regex"));

/// Join command-line words into one scenario string
///
/// The shell has already split the words, so a `key=value` word whose
/// value contains whitespace gets quoted again.
pub fn join_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| match PARAM_WITH_SPACE.captures(arg) {
            Some(caps) => {
                let value = caps[2].replace('\\', "\\\\").replace('\'', "\\'");
                format!("{}='{}'", &caps[1], value)
            }
            None => arg.clone(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical spelling of a built-in block name
fn canonical_name(name: &str) -> Option<&'static str> {
    let wanted = name.replace("::", ".");
    BLOCK_NAMES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(&wanted))
}

/// Parameters of one block, consumed as the block is built
struct Params<'a> {
    block: &'static str,
    values: Vec<(&'a str, &'a str)>,
}

impl<'a> Params<'a> {
    fn new(block: &'static str, spec: &'a BlockSpec) -> Self {
        Self {
            block,
            values: spec
                .params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
        }
    }

    fn bad(&self, message: String) -> ScenarioError {
        ScenarioError::BadParam {
            block: self.block.to_string(),
            message,
        }
    }

    /// Remove a parameter; the last occurrence wins
    fn take(&mut self, key: &str) -> Option<&'a str> {
        let mut found = None;
        self.values.retain(|(k, v)| {
            if *k == key {
                found = Some(*v);
                false
            } else {
                true
            }
        });
        found
    }

    fn take_bool(&mut self, key: &str) -> Result<Option<bool>, ScenarioError> {
        match self.take(key) {
            None => Ok(None),
            Some("1" | "true") => Ok(Some(true)),
            Some("0" | "false" | "") => Ok(Some(false)),
            Some(other) => Err(self.bad(format!("{} must be 0 or 1, got '{}'", key, other))),
        }
    }

    fn take_usize(&mut self, key: &str) -> Result<Option<usize>, ScenarioError> {
        match self.take(key) {
            None => Ok(None),
            Some(value) => value.parse().map(Some).map_err(|_| {
                self.bad(format!("{} must be a non-negative integer, got '{}'", key, value))
            }),
        }
    }

    /// Inputs of a reader: the `files` parameter, else the default files
    fn take_inputs(&mut self, default_files: &[PathBuf]) -> Result<Vec<PathBuf>, ScenarioError> {
        match self.take("files") {
            Some(files) => expand_files(files).map_err(|e| self.bad(e.to_string())),
            None => Ok(default_files.to_vec()),
        }
    }

    /// Fail on any parameter the block did not ask for
    fn finish(self) -> Result<(), ScenarioError> {
        match self.values.first() {
            Some((key, _)) => Err(self.bad(format!("unknown parameter '{}'", key))),
            None => Ok(()),
        }
    }
}

/// Split a `files` value at commas and whitespace, expanding globs
///
/// Globs are sorted; a pattern without wildcards is kept as given even if
/// no such file exists, so opening it reports the error.
fn expand_files(value: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    let mut files = Vec::new();
    for pattern in value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
    {
        if pattern.contains(['*', '?', '[']) {
            let mut matched: Vec<PathBuf> = glob::glob(pattern)?.filter_map(Result::ok).collect();
            matched.sort();
            files.extend(matched);
        } else {
            files.push(PathBuf::from(pattern));
        }
    }
    Ok(files)
}

fn stdout() -> Box<dyn Write> {
    Box::new(BufWriter::new(io::stdout()))
}

/// Build a built-in block from its spec
///
/// Reader blocks without a `files` parameter read `default_files`, or
/// standard input if there are none.
pub fn create_block(
    spec: &BlockSpec,
    default_files: &[PathBuf],
) -> Result<Box<dyn Block>, ScenarioError> {
    let name = canonical_name(&spec.name)
        .ok_or_else(|| ScenarioError::UnknownBlock(spec.name.clone()))?;
    let mut params = Params::new(name, spec);

    let block: Box<dyn Block> = match name {
        "read.Conllu" => {
            let files = params.take_inputs(default_files)?;
            let zone = params.take("zone").filter(|z| *z != "keep");
            if let Some(zone) = zone
                && !is_valid_zone(zone)
            {
                return Err(params.bad(format!("'{}' is not a valid zone name", zone)));
            }
            let bundles_per_doc = match params.take_usize("bundles_per_doc")? {
                Some(n) => Some(n),
                None => params.take_usize("bundlesPerDoc")?,
            };
            let options = ReaderOptions {
                zone: zone.map(str::to_string),
                bundles_per_doc: bundles_per_doc.unwrap_or(0),
                parallel: params.take_bool("parallel")?.unwrap_or(false),
            };
            Box::new(ReadConllu::new(Input::from_files(files), options))
        }
        "read.Sentences" => {
            let files = params.take_inputs(default_files)?;
            Box::new(ReadSentences::new(Input::from_files(files)))
        }
        "write.Conllu" => {
            let options = WriterOptions {
                print_sent_id: params.take_bool("print_sent_id")?.unwrap_or(false),
            };
            Box::new(WriteConllu::new(stdout(), options))
        }
        "write.Sentences" => {
            let if_missing = match params.take("if_missing") {
                Some(value) => value.parse::<IfMissing>().map_err(|e| params.bad(e))?,
                None => IfMissing::default(),
            };
            Box::new(WriteSentences::new(stdout(), SentencesOptions { if_missing }))
        }
        "tutorial.Adpositions" => Box::new(Adpositions::new(stdout())),
        "tutorial.DeleteCommas" => Box::new(DeleteCommas),
        "tutorial.RehangPrepositions" => Box::new(RehangPrepositions),
        "tutorial.ToPositions" => Box::new(ToPositions),
        "util.Normalize" => Box::new(Normalize),
        _ => return Err(ScenarioError::UnknownBlock(spec.name.clone())),
    };

    params.finish()?;
    Ok(block)
}

/// A runnable sequence of blocks
pub struct Scenario {
    blocks: Vec<Box<dyn Block>>,
}

impl Scenario {
    pub fn new(blocks: Vec<Box<dyn Block>>) -> Self {
        Self { blocks }
    }

    pub fn from_specs(specs: &[BlockSpec], default_files: &[PathBuf]) -> Result<Self, ScenarioError> {
        let blocks = specs
            .iter()
            .map(|spec| create_block(spec, default_files))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(blocks))
    }

    /// Parse a scenario string and build its blocks
    pub fn parse(text: &str, default_files: &[PathBuf]) -> Result<Self, ScenarioError> {
        Self::from_specs(&parse_scenario(text)?, default_files)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Run every block over every document; returns the number of documents
    ///
    /// Each round starts from an empty document. Rounds repeat while some
    /// block (a reader with input left) asks for more.
    pub fn run(&mut self) -> Result<usize, ScenarioError> {
        for block in &mut self.blocks {
            block.process_start().map_err(|e| with_block(block.as_ref(), e))?;
        }

        let total = self.blocks.len();
        let mut documents = 0;
        loop {
            let mut document = Document::new();
            for (i, block) in self.blocks.iter_mut().enumerate() {
                info!("Applying block {}/{} {}", i + 1, total, block.name());
                apply(block.as_mut(), &mut document).map_err(|e| with_block(block.as_ref(), e))?;
            }
            documents += 1;
            debug!(
                document = documents,
                bundles = document.len(),
                words = count_words(&document),
                "document done"
            );

            let mut more = false;
            for block in &mut self.blocks {
                more |= block.has_more().map_err(|e| with_block(block.as_ref(), e))?;
            }
            if !more {
                break;
            }
        }

        for block in &mut self.blocks {
            block.process_end().map_err(|e| with_block(block.as_ref(), e))?;
        }
        Ok(documents)
    }
}

fn apply(block: &mut dyn Block, document: &mut Document) -> Result<(), BlockError> {
    block.before_process_document(document)?;
    block.process_document(document)?;
    block.after_process_document(document)
}

fn with_block(block: &dyn Block, source: BlockError) -> ScenarioError {
    ScenarioError::Block {
        block: block.name().to_string(),
        source,
    }
}
