//! Contract/function scope of a position in the tree.

use crate::path::NodePath;
use crate::tree::Ast;
use serde::{Deserialize, Serialize};

/// Enclosing contract and function names. Unnamed functions (fallback,
/// old-style constructors) report an empty name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeInfo {
    pub contract: Option<String>,
    pub function: Option<String>,
}

impl ScopeInfo {
    pub fn new(contract: Option<&str>, function: Option<&str>) -> Self {
        Self {
            contract: contract.map(str::to_string),
            function: function.map(str::to_string),
        }
    }

    /// True if `other` lies in the same contract, and in the same function
    /// when this scope names one.
    pub fn admits(&self, other: &ScopeInfo) -> bool {
        self.contract == other.contract
            && (self.function.is_none() || self.function == other.function)
    }
}

/// Resolve the scope of `path` by walking it from the root. The walk stops at
/// the first function definition.
pub fn scope_of(ast: &Ast, path: &NodePath) -> ScopeInfo {
    let mut scope = ScopeInfo::default();
    for (_, node) in ast.nodes_along(path) {
        match node.ty() {
            "ContractDefinition" => {
                scope.contract = node.str_field("name").map(str::to_string);
            }
            "FunctionDefinition" => {
                scope.function = Some(node.str_field("name").unwrap_or_default().to_string());
                break;
            }
            _ => {}
        }
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Node, Value};

    fn tree() -> Ast {
        let body = Node::new("Block").with(
            "statements",
            vec![Node::new("ExpressionStatement")
                .with("expression", Node::new("Identifier").with("name", "a"))
                .into()],
        );
        let deposit = Node::new("FunctionDefinition")
            .with("name", "deposit")
            .with("body", body);
        let fallback = Node::new("FunctionDefinition")
            .with("name", Value::Null)
            .with("body", Node::new("Block").with("statements", Vec::<Value>::new()));
        let contract = Node::new("ContractDefinition")
            .with("name", "Bank")
            .with("subNodes", vec![deposit.into(), fallback.into()]);
        Ast::new(Node::new("SourceUnit").with("children", vec![contract.into()]))
    }

    #[test]
    fn resolves_contract_and_function() {
        let ast = tree();
        let inside: NodePath = "children.0.subNodes.0.body.statements.0.expression".parse().unwrap();
        assert_eq!(scope_of(&ast, &inside), ScopeInfo::new(Some("Bank"), Some("deposit")));

        let contract_level: NodePath = "children.0.subNodes".parse().unwrap();
        assert_eq!(scope_of(&ast, &contract_level), ScopeInfo::new(Some("Bank"), None));

        assert_eq!(scope_of(&ast, &NodePath::root()), ScopeInfo::default());
    }

    #[test]
    fn unnamed_function_has_empty_name() {
        let ast = tree();
        let body: NodePath = "children.0.subNodes.1.body".parse().unwrap();
        assert_eq!(scope_of(&ast, &body).function.as_deref(), Some(""));
    }

    #[test]
    fn admits_requires_matching_contract() {
        let contract_only = ScopeInfo::new(Some("Bank"), None);
        let in_fn = ScopeInfo::new(Some("Bank"), Some("deposit"));
        assert!(contract_only.admits(&in_fn));
        assert!(in_fn.admits(&in_fn));
        assert!(!in_fn.admits(&contract_only));
        assert!(!contract_only.admits(&ScopeInfo::new(Some("Other"), None)));
    }
}
