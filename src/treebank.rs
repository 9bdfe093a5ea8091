//! Input sources for documents
//!
//! A [`Treebank`] names where CoNLL-U comes from:
//! - an in-memory string
//! - a single file (gzip if it ends in `.gz`)
//! - several files, from a glob pattern or an explicit list
//! - standard input
//!
//! Files are read one after another; a document never spans two files.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::conllu::{CoNLLUReader, ParseError, ReaderOptions};
use crate::document::Document;

/// Error while reading from a [`Treebank`]
#[derive(Debug, Error)]
pub enum TreebankError {
    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{origin}: {source}")]
    Parse { origin: String, source: ParseError },
}

/// Source of trees for a collection
#[derive(Debug, Clone, PartialEq, Eq)]
enum TreeSource {
    /// In-memory CoNLL-U text
    String(String),
    /// Single file path
    File(PathBuf),
    /// Multiple file paths (from glob or explicit paths)
    Files(Vec<PathBuf>),
    Stdin,
}

/// Collection of documents from a string, files, or standard input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Treebank {
    source: TreeSource,
    options: ReaderOptions,
}

impl Treebank {
    /// Create from an in-memory CoNLL-U string
    pub fn from_string(text: &str) -> Self {
        Self::new(TreeSource::String(text.to_string()))
    }

    /// Create from a single file path
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self::new(TreeSource::File(path.as_ref().to_path_buf()))
    }

    /// Create from a glob pattern
    ///
    /// Files are processed in sorted order for deterministic results.
    pub fn from_glob(pattern: &str) -> Result<Self, glob::PatternError> {
        let mut file_paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(Result::ok).collect();
        file_paths.sort();
        Ok(Self::from_paths(file_paths))
    }

    /// Create from explicit file paths
    pub fn from_paths(file_paths: Vec<PathBuf>) -> Self {
        Self::new(TreeSource::Files(file_paths))
    }

    pub fn stdin() -> Self {
        Self::new(TreeSource::Stdin)
    }

    fn new(source: TreeSource) -> Self {
        Self {
            source,
            options: ReaderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Documents in input order, stopping at nothing: errors are yielded in place
    pub fn documents(self) -> Box<dyn Iterator<Item = Result<Document, TreebankError>>> {
        let options = self.options;
        match self.source {
            TreeSource::String(text) => Box::new(read_all(
                CoNLLUReader::from_str(&text).with_options(options),
                "<string>".to_string(),
            )),
            TreeSource::Stdin => Box::new(read_all(
                CoNLLUReader::from_reader(BufReader::new(std::io::stdin())).with_options(options),
                "<stdin>".to_string(),
            )),
            TreeSource::File(path) => open_file_documents(path, options),
            TreeSource::Files(paths) => Box::new(
                paths
                    .into_iter()
                    .flat_map(move |path| open_file_documents(path, options.clone())),
            ),
        }
    }
}

impl IntoIterator for Treebank {
    type Item = Document;
    type IntoIter = Box<dyn Iterator<Item = Self::Item>>;

    /// Documents in input order; errors are logged and skipped
    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.documents().filter_map(|result| match result {
            Ok(document) => Some(document),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }))
    }
}

fn read_all(
    reader: CoNLLUReader,
    origin: String,
) -> impl Iterator<Item = Result<Document, TreebankError>> {
    reader.map(move |result| {
        result.map_err(|source| TreebankError::Parse {
            origin: origin.clone(),
            source,
        })
    })
}

/// Helper: Open a file and return an iterator over its documents
///
/// A file that cannot be opened yields a single error.
fn open_file_documents(
    path: PathBuf,
    options: ReaderOptions,
) -> Box<dyn Iterator<Item = Result<Document, TreebankError>>> {
    match CoNLLUReader::from_file(&path) {
        Ok(reader) => {
            debug!(path = %path.display(), "reading");
            let origin = path.display().to_string();
            Box::new(read_all(reader.with_options(options), origin))
        }
        Err(source) => Box::new(std::iter::once(Err(TreebankError::Open { path, source }))),
    }
}
