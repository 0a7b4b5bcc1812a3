//! Seams to the external parser and printer.

use crate::error::AstError;
use crate::tree::Ast;

/// Turns source text into a tree.
pub trait Parser {
    fn parse(&self, source: &str) -> Result<Ast, AstError>;
}

/// Renders a tree back to source text.
pub trait Printer {
    fn print(&self, ast: &Ast) -> Result<String, AstError>;
}

impl<T: Parser + ?Sized> Parser for Box<T> {
    fn parse(&self, source: &str) -> Result<Ast, AstError> {
        (**self).parse(source)
    }
}

impl<T: Printer + ?Sized> Printer for Box<T> {
    fn print(&self, ast: &Ast) -> Result<String, AstError> {
        (**self).print(ast)
    }
}
