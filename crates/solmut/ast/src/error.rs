//! Error types for the tree model.

use crate::path::NodePath;
use thiserror::Error;

/// Errors raised while reading, addressing or editing a tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AstError {
    /// No value exists at the given path.
    #[error("no value at path {0}")]
    PathNotFound(NodePath),

    /// The value at the path was expected to be a list.
    #[error("value at path {0} is not a list")]
    NotAList(NodePath),

    /// The value at the path was expected to be a node.
    #[error("value at path {0} is not a node")]
    NotANode(NodePath),

    /// A list index is outside the list bounds.
    #[error("index {index} out of range for list of length {len} at path {path}")]
    IndexOutOfRange {
        path: NodePath,
        index: usize,
        len: usize,
    },

    /// The JSON form of a tree could not be read or written.
    #[error("json error: {0}")]
    Json(String),

    /// An external parser rejected the source text.
    #[error("parse error: {0}")]
    Parse(String),

    /// An external printer could not render a tree.
    #[error("print error: {0}")]
    Print(String),
}

impl From<serde_json::Error> for AstError {
    fn from(err: serde_json::Error) -> Self {
        AstError::Json(err.to_string())
    }
}
