use super::{anchor_locations, LocMap, ModifiedLocations};
use crate::error::MutationError;
use serde::{Deserialize, Serialize};
use solmut_ast::{Ast, AstError, Node, NodePath, Value};

/// Swap the node at a path for a new one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replacement {
    target_node_path: NodePath,
    new_node: Node,
}

impl Replacement {
    pub fn new(target_node_path: NodePath, new_node: Node) -> Self {
        Self {
            target_node_path,
            new_node,
        }
    }

    pub fn target(&self) -> &NodePath {
        &self.target_node_path
    }

    pub fn node(&self) -> &Node {
        &self.new_node
    }

    pub fn apply(&self, ast: &Ast) -> Result<Ast, MutationError> {
        if ast.node_at(&self.target_node_path).is_none() {
            return Err(AstError::NotANode(self.target_node_path.clone()).into());
        }
        let mut out = ast.clone();
        out.replace(&self.target_node_path, Value::node(self.new_node.clone()))?;
        Ok(out)
    }

    pub fn forward_map(&self, path: &NodePath) -> Option<NodePath> {
        if path.is_strictly_inside(&self.target_node_path) {
            None
        } else {
            Some(path.clone())
        }
    }

    pub fn reverse_map(&self, path: &NodePath) -> Option<NodePath> {
        self.forward_map(path)
    }

    pub fn modified_locations(&self, ast: &Ast, locs: &LocMap) -> ModifiedLocations {
        anchor_locations(ast.node_at(&self.target_node_path), &self.target_node_path, locs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn replaces_the_node() {
        let ast = simple_tree(&["a", "b"]);
        let rep = Replacement::new(statement_path(0, 1), stmt("z"));
        let after = rep.apply(&ast).unwrap();
        assert_eq!(statement_names(&after, 0), vec!["a", "z"]);
        assert_eq!(statement_names(&ast, 0), vec!["a", "b"]);
    }

    #[test]
    fn inner_paths_are_invalidated() {
        let rep = Replacement::new(statement_path(0, 1), stmt("z"));
        let inner = statement_path(0, 1).child_field("expression");
        assert_eq!(rep.forward_map(&inner), None);
        assert_eq!(rep.reverse_map(&inner), None);
        assert_eq!(rep.forward_map(&statement_path(0, 1)), Some(statement_path(0, 1)));
        assert_eq!(rep.forward_map(&statement_path(0, 0)), Some(statement_path(0, 0)));
        assert_eq!(rep.forward_map(&statements_path(0)), Some(statements_path(0)));
    }

    #[test]
    fn target_must_be_a_node() {
        let ast = simple_tree(&["a"]);
        let rep = Replacement::new(statements_path(0), stmt("z"));
        assert_eq!(
            rep.apply(&ast),
            Err(MutationError::Tree(AstError::NotANode(statements_path(0))))
        );
    }
}
