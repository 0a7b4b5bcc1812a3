use super::{anchor_locations, LocMap, ModifiedLocations};
use crate::error::MutationError;
use serde::{Deserialize, Serialize};
use solmut_ast::{Ast, Node, NodePath, Value};

/// Insert a node into a list before position `insert_index`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insertion {
    target_property_path: NodePath,
    insert_index: usize,
    new_node: Node,
}

impl Insertion {
    pub fn new(target_property_path: NodePath, insert_index: usize, new_node: Node) -> Self {
        Self {
            target_property_path,
            insert_index,
            new_node,
        }
    }

    /// Path of the list being extended.
    pub fn property(&self) -> &NodePath {
        &self.target_property_path
    }

    pub fn index(&self) -> usize {
        self.insert_index
    }

    pub fn node(&self) -> &Node {
        &self.new_node
    }

    /// Path the new node occupies after the edit.
    pub fn slot(&self) -> NodePath {
        self.target_property_path.child_index(self.insert_index)
    }

    /// The node owning the target list.
    pub fn target_node_path(&self) -> NodePath {
        self.target_property_path.parent().unwrap_or_default()
    }

    pub fn apply(&self, ast: &Ast) -> Result<Ast, MutationError> {
        let mut out = ast.clone();
        out.insert(
            &self.target_property_path,
            self.insert_index,
            Value::node(self.new_node.clone()),
        )?;
        Ok(out)
    }

    fn position_in_list(&self, path: &NodePath) -> Option<usize> {
        if path.is_strictly_inside(&self.target_property_path) {
            path.segment(self.target_property_path.len())
                .and_then(|s| s.as_index())
        } else {
            None
        }
    }

    pub fn forward_map(&self, path: &NodePath) -> Option<NodePath> {
        match self.position_in_list(path) {
            Some(i) if i >= self.insert_index => {
                Some(path.with_index_at(self.target_property_path.len(), i + 1))
            }
            _ => Some(path.clone()),
        }
    }

    /// The inserted slot and everything below it has no counterpart before
    /// the edit.
    pub fn reverse_map(&self, path: &NodePath) -> Option<NodePath> {
        match self.position_in_list(path) {
            Some(i) if i == self.insert_index => None,
            Some(i) if i > self.insert_index => {
                Some(path.with_index_at(self.target_property_path.len(), i - 1))
            }
            _ => Some(path.clone()),
        }
    }

    /// Located by the closest node above the target list.
    pub fn modified_locations(&self, ast: &Ast, locs: &LocMap) -> ModifiedLocations {
        let anchor = ast
            .nearest_node_ancestor(&self.target_property_path)
            .and_then(|p| ast.node_at(&p));
        anchor_locations(anchor, &self.target_node_path(), locs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use solmut_ast::{CodeRange, LineColumn};

    #[test]
    fn inserts_before_the_index() {
        let ast = simple_tree(&["a", "b"]);
        let ins = Insertion::new(statements_path(0), 1, stmt("z"));
        let after = ins.apply(&ast).unwrap();
        assert_eq!(statement_names(&after, 0), vec!["a", "z", "b"]);

        let at_end = Insertion::new(statements_path(0), 2, stmt("z")).apply(&ast).unwrap();
        assert_eq!(statement_names(&at_end, 0), vec!["a", "b", "z"]);

        assert!(Insertion::new(statements_path(0), 3, stmt("z")).apply(&ast).is_err());
        assert!(Insertion::new(statement_path(0, 0), 0, stmt("z")).apply(&ast).is_err());
    }

    #[test]
    fn path_maps() {
        let ins = Insertion::new(statements_path(0), 1, stmt("z"));
        assert_eq!(ins.forward_map(&statement_path(0, 0)), Some(statement_path(0, 0)));
        assert_eq!(ins.forward_map(&statement_path(0, 1)), Some(statement_path(0, 2)));
        assert_eq!(
            ins.forward_map(&statement_path(0, 1).child_field("expression")),
            Some(statement_path(0, 2).child_field("expression"))
        );
        assert_eq!(ins.forward_map(&statements_path(0)), Some(statements_path(0)));

        assert_eq!(ins.reverse_map(&statement_path(0, 1)), None);
        assert_eq!(ins.reverse_map(&statement_path(0, 1).child_field("expression")), None);
        assert_eq!(ins.reverse_map(&statement_path(0, 2)), Some(statement_path(0, 1)));
        assert_eq!(ins.reverse_map(&statement_path(0, 0)), Some(statement_path(0, 0)));
    }

    #[test]
    fn round_trip_and_node_identity() {
        let ast = simple_tree(&["a", "b", "c"]);
        let ins = Insertion::new(statements_path(0), 2, stmt("z"));
        let after = ins.apply(&ast).unwrap();
        for i in 0..3 {
            let p = statement_path(0, i);
            let q = ins.forward_map(&p).unwrap();
            assert_eq!(ins.reverse_map(&q), Some(p.clone()));
            assert!(ast.node_at(&p).unwrap().canonical_eq(after.node_at(&q).unwrap()));
        }
        assert!(after.node_at(&ins.slot()).unwrap().canonical_eq(&stmt("z")));
    }

    #[test]
    fn located_by_owner() {
        let span = CodeRange::new(LineColumn::new(4, 2), LineColumn::new(8, 3));
        let ast = Ast::new(block(vec![stmt("a")]).with_loc(span));
        let ins = Insertion::new(path("statements"), 0, stmt("z"));
        assert_eq!(ins.target_node_path(), NodePath::root());
        assert_eq!(
            ins.modified_locations(&ast, &LocMap::new()),
            ModifiedLocations::Known(vec![span])
        );

        let unlocated = simple_tree(&["a"]);
        let ins = Insertion::new(statements_path(0), 0, stmt("z"));
        assert_eq!(ins.modified_locations(&unlocated, &LocMap::new()), ModifiedLocations::Unknown);
    }
}
