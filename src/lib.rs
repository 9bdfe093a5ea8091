//! Deptree: editable dependency trees
//!
//! A toolkit for reading, restructuring and writing dependency parses in
//! CoNLL-U. Every tree keeps its word order and its parent/child topology
//! consistent under reparenting, removal and reordering.

// Core modules
pub mod document; // Documents, bundles and the node id generator
pub mod edit; // Reparent, remove and shift operations
pub mod error;
pub mod node; // Node attributes, enhanced deps, multiword tokens
pub mod tree; // Tree arena, word order and read-only queries

// Input and output
mod bytes;
pub mod conllu; // CoNLL-U reader
pub mod treebank; // Strings, files and globs as document sources
pub mod writer; // CoNLL-U and plain-text writers

// Processing pipeline
pub mod block; // Block trait and built-in blocks
pub mod scenario; // Scenario parser, block registry and runner

// Re-exports for convenience
pub use block::{Block, BlockError};
pub use conllu::{CoNLLUReader, ParseError, ReaderOptions};
pub use document::{Bundle, Document, IdGenerator};
pub use edit::{RemoveOptions, ShiftMode, ShiftOptions};
pub use error::TreeError;
pub use node::{EmptyNode, EnhancedDep, EnhancedDeps, Governor, Mwt, Node, NodeId};
pub use scenario::{Scenario, ScenarioError};
pub use tree::{Extreme, Select, Tree};
pub use treebank::Treebank;
pub use writer::{CoNLLUWriter, SentencesWriter, WriterOptions};
