#![deny(unsafe_code)]
//! # solmut-ast
//!
//! Tree model for parsed contract sources.
//!
//! A tree is a JSON-shaped value whose objects carry a `type` tag. Subtrees
//! are shared through `Arc`, so deriving a new tree from an old one copies
//! only the nodes along the edited path. The crate also provides the path
//! type used to address positions, canonical comparison that ignores source
//! location metadata, a visitor, the scope resolver and the parser/printer
//! seams implemented by external tools.

pub mod error;
pub mod io;
pub mod location;
pub mod path;
pub mod scope;
pub mod tree;
pub mod visit;

pub use error::AstError;
pub use io::{Parser, Printer};
pub use location::{CodeRange, LineColumn};
pub use path::{NodePath, PathSegment};
pub use scope::{scope_of, ScopeInfo};
pub use tree::{Ast, Node, Value, EXTRA_FIELDS};
pub use visit::{walk, walk_from, VisitFlow, Visitor};
