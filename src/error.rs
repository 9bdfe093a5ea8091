//! Error types for tree operations

use thiserror::Error;

/// Error raised by a structural operation on a tree
///
/// Both kinds are raised before anything in the tree changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Reparenting would make a node its own ancestor
    #[error("Cycle: setting parent of node {ord} to node {parent} would create a cycle")]
    Cycle { ord: usize, parent: usize },

    /// Bad argument: removed node, unknown node, the technical root where a word is required
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl TreeError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        TreeError::InvalidOperation(message.into())
    }

    /// True for [`TreeError::Cycle`]
    pub fn is_cycle(&self) -> bool {
        matches!(self, TreeError::Cycle { .. })
    }
}
