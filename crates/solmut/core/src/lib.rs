#![deny(unsafe_code)]
//! # solmut-core
//!
//! Mutant generation for contract source trees.
//!
//! - [`mutation`]: the four edit kinds and how each one moves paths.
//! - [`sequence`]: edit histories, their replay and location reporting.
//! - [`crossover`]: one-point recombination of two histories.
//! - [`fault_space`]: where each edit kind may still be applied.
//! - [`interest`]: textual region specifiers and fault-space collection.
//! - [`node_space`]: enumeration of candidate nodes for insertion and replacement.
//! - [`generator`]: per-kind edit sources behind one random generator.
//! - [`engine`]: the distance-indexed search with deduplication.

pub mod cancel;
pub mod compile;
pub mod crossover;
pub mod engine;
pub mod error;
pub mod fault_space;
pub mod generator;
pub mod interest;
pub mod mutation;
pub mod node_space;
pub mod sequence;

#[cfg(test)]
mod testing;

pub use cancel::CancellationToken;
pub use compile::{
    classify_diagnostics, strip_swarm_metadata, CompileMode, CompileOutcome, Compiler, Diagnostic,
    Verdict,
};
pub use crossover::crossover_one_point;
pub use engine::{
    seed_from_text, AddOutcome, Distance, EngineConfig, MutationSequenceGenerator, NextOutcome,
    NextRequest, Toolchain,
};
pub use error::{CompileError, CrossoverError, EngineError, MutationError, SpecifierError};
pub use fault_space::{EligibilityPolicy, FaultSpace, FaultSpaceEntry, FaultSpaceUpdate};
pub use generator::{
    DeletionSource, GeneratorSettings, InsertionSource, MovementSource, MutationSource, Proposal,
    RandomMutationGenerator, ReplacementSource,
};
pub use interest::{generate_fault_space, parse_specifier, InterestRegion};
pub use mutation::{
    Deletion, Insertion, LocMap, ModifiedLocations, Movement, Mutation, MutationKind, Replacement,
};
pub use node_space::{GenerationContext, NodeGenerator, NodeSpace, RandomNodeSpace, SeededNodeSpace, Space};
pub use sequence::MutationSequence;
