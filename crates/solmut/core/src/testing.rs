//! Tree fixtures shared by unit tests.

use solmut_ast::{Ast, Node, NodePath, Value};

pub(crate) fn path(s: &str) -> NodePath {
    s.parse().unwrap()
}

pub(crate) fn ident(name: &str) -> Node {
    Node::new("Identifier").with("name", name)
}

/// `name;`
pub(crate) fn stmt(name: &str) -> Node {
    Node::new("ExpressionStatement").with("expression", ident(name))
}

pub(crate) fn block(statements: Vec<Node>) -> Node {
    Node::new("Block").with(
        "statements",
        statements.into_iter().map(Value::from).collect::<Vec<_>>(),
    )
}

pub(crate) fn function(name: &str, statements: Vec<Node>) -> Node {
    Node::new("FunctionDefinition")
        .with("name", name)
        .with("visibility", "public")
        .with("body", block(statements))
}

/// `contract C { function f() { a; b; ... } ... }`
pub(crate) fn contract_tree(functions: Vec<Node>) -> Ast {
    let contract = Node::new("ContractDefinition")
        .with("name", "C")
        .with("subNodes", functions.into_iter().map(Value::from).collect::<Vec<_>>());
    Ast::new(Node::new("SourceUnit").with("children", vec![Value::from(contract)]))
}

/// A single function `f` whose body holds one identifier statement per name.
pub(crate) fn simple_tree(names: &[&str]) -> Ast {
    contract_tree(vec![function("f", names.iter().map(|n| stmt(n)).collect())])
}

pub(crate) fn statements_path(function: usize) -> NodePath {
    path(&format!("children.0.subNodes.{}.body.statements", function))
}

pub(crate) fn statement_path(function: usize, index: usize) -> NodePath {
    statements_path(function).child_index(index)
}

/// Identifier names of the statements of a function body, `?` for others.
pub(crate) fn statement_names(ast: &Ast, function: usize) -> Vec<String> {
    ast.get(&statements_path(function))
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .map(|v| {
            v.as_node()
                .and_then(|n| n.node_field("expression"))
                .and_then(|e| e.str_field("name"))
                .unwrap_or("?")
                .to_string()
        })
        .collect()
}
