//! Depth-first traversal with explicit enter/exit callbacks.

use crate::path::{NodePath, PathSegment};
use crate::tree::{Ast, Node, Value};

/// What the walker should do after entering a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisitFlow {
    Continue,
    /// Do not descend into this node. `exit` is not called for it.
    SkipChildren,
}

/// Callbacks invoked for every node reached by [`walk`].
pub trait Visitor {
    fn enter(&mut self, _node: &Node, _path: &NodePath) -> VisitFlow {
        VisitFlow::Continue
    }

    fn exit(&mut self, _node: &Node, _path: &NodePath) {}
}

/// Walk every node of `ast` in field order, lists in index order.
pub fn walk<V: Visitor + ?Sized>(ast: &Ast, visitor: &mut V) {
    let mut path = NodePath::root();
    walk_value(ast.root(), &mut path, visitor);
}

/// Walk the subtree rooted at `value`, reporting paths relative to `base`.
pub fn walk_from<V: Visitor + ?Sized>(value: &Value, base: &NodePath, visitor: &mut V) {
    let mut path = base.clone();
    walk_value(value, &mut path, visitor);
}

fn walk_value<V: Visitor + ?Sized>(value: &Value, path: &mut NodePath, visitor: &mut V) {
    match value {
        Value::Node(node) => {
            if visitor.enter(node, path) == VisitFlow::SkipChildren {
                return;
            }
            for (name, child) in node.fields() {
                path.push(PathSegment::Field(name.clone()));
                walk_value(child, path, visitor);
                path.pop();
            }
            visitor.exit(node, path);
        }
        Value::List(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(PathSegment::Index(i));
                walk_value(child, path, visitor);
                path.pop();
            }
        }
        Value::Object(map) => {
            for (name, child) in map {
                path.push(PathSegment::Field(name.clone()));
                walk_value(child, path, visitor);
                path.pop();
            }
        }
        _ => {}
    }
}
