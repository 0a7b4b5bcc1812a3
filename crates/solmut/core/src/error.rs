//! Error types for the mutation engine.

use crate::engine::AddOutcome;
use crate::mutation::MutationKind;
use solmut_ast::{AstError, NodePath};
use thiserror::Error;

/// Errors raised when building or applying a single mutation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// The underlying tree edit failed.
    #[error("tree edit failed: {0}")]
    Tree(#[from] AstError),

    /// A deletion must address a list element.
    #[error("deletion target {0} is not a list element")]
    NotAListElement(NodePath),

    /// The movement would put the node back where it was.
    #[error("moving {0} to its own position is a no-op")]
    NoOpMovement(NodePath),

    /// A movement was applied to a tree other than the one it was built on.
    #[error("movement applied to a different tree than it was built against")]
    TreeMismatch,

    /// The destination slot disappears once the source is removed.
    #[error("destination {0} is invalidated by removing the source")]
    InvalidDestination(NodePath),

    /// There is no node at the movement source.
    #[error("no node at movement source {0}")]
    MissingSource(NodePath),
}

/// Errors raised while reading a region specifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpecifierError {
    #[error("empty name in clause '{0}'")]
    EmptyName(String),

    #[error("location clause '{0}' needs a start and an end separated by '-'")]
    MissingRangeSeparator(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("type clause '{0}' has too many '-' separated parts")]
    TooManyParts(String),

    #[error("empty node type in clause '{0}'")]
    EmptyNodeType(String),
}

/// Errors raised by one-point crossover.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrossoverError {
    /// A cross point must address a step of its sequence.
    #[error("cross point {point} is out of range for a sequence of length {len}")]
    CrossPointOutOfRange { point: usize, len: usize },

    /// A parent prefix does not apply to the origin tree.
    #[error("parent sequence does not apply: {0}")]
    Mutation(#[from] MutationError),
}

/// Errors raised by the compiler seam.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// The compiler process could not be started.
    #[error("failed to start compiler: {0}")]
    Spawn(String),

    /// The compiler exited abnormally.
    #[error("compiler crashed: {0}")]
    Crashed(String),

    /// Reading from or writing to the compiler failed.
    #[error("compiler i/o failed: {0}")]
    Io(String),

    /// The compiler output could not be understood.
    #[error("malformed compiler output: {0}")]
    Malformed(String),
}

/// Errors raised by the search engine. Exhaustion and cancellation are not
/// errors; they are reported through `NextOutcome`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Tree(#[from] AstError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A request named a base tree the engine never registered.
    #[error("requested base tree is unknown")]
    UnknownBase,

    /// Some must-include kinds are not among the enabled kinds.
    #[error("must-include kinds {0:?} are not enabled")]
    MustIncludeNotAllowed(Vec<MutationKind>),

    /// The origin tree could not be registered.
    #[error("origin tree was not accepted: {0:?}")]
    OriginRejected(AddOutcome),

    /// Compile validation was requested without a compiler.
    #[error("compile validation is enabled but no toolchain is configured")]
    MissingToolchain,
}
