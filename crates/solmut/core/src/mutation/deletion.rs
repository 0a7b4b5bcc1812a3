use super::{anchor_locations, LocMap, ModifiedLocations};
use crate::error::MutationError;
use serde::{Deserialize, Serialize};
use solmut_ast::{Ast, NodePath};

/// Remove one list element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DeletionRepr", into = "DeletionRepr")]
pub struct Deletion {
    target: NodePath,
    list: NodePath,
    index: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletionRepr {
    target_node_path: NodePath,
}

impl TryFrom<DeletionRepr> for Deletion {
    type Error = MutationError;

    fn try_from(repr: DeletionRepr) -> Result<Self, Self::Error> {
        Deletion::new(repr.target_node_path)
    }
}

impl From<Deletion> for DeletionRepr {
    fn from(d: Deletion) -> Self {
        DeletionRepr {
            target_node_path: d.target,
        }
    }
}

impl Deletion {
    /// `target` must end in a list index.
    pub fn new(target: NodePath) -> Result<Self, MutationError> {
        let (list, index) = target
            .split_last_index()
            .ok_or_else(|| MutationError::NotAListElement(target.clone()))?;
        Ok(Self {
            target,
            list,
            index,
        })
    }

    pub fn target(&self) -> &NodePath {
        &self.target
    }

    pub fn apply(&self, ast: &Ast) -> Result<Ast, MutationError> {
        let mut out = ast.clone();
        out.remove(&self.target)?;
        Ok(out)
    }

    /// Index a path takes in the list this deletion edits, if it runs through it.
    fn position_in_list(&self, path: &NodePath) -> Option<usize> {
        if path.is_strictly_inside(&self.list) {
            path.segment(self.list.len()).and_then(|s| s.as_index())
        } else {
            None
        }
    }

    pub fn forward_map(&self, path: &NodePath) -> Option<NodePath> {
        if path.starts_with(&self.target) {
            return None;
        }
        match self.position_in_list(path) {
            Some(i) if i > self.index => Some(path.with_index_at(self.list.len(), i - 1)),
            _ => Some(path.clone()),
        }
    }

    pub fn reverse_map(&self, path: &NodePath) -> Option<NodePath> {
        match self.position_in_list(path) {
            Some(i) if i >= self.index => Some(path.with_index_at(self.list.len(), i + 1)),
            _ => Some(path.clone()),
        }
    }

    pub fn modified_locations(&self, ast: &Ast, locs: &LocMap) -> ModifiedLocations {
        anchor_locations(ast.node_at(&self.target), &self.target, locs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use solmut_ast::{walk, Node, VisitFlow, Visitor};

    struct AllPaths(Vec<NodePath>);

    impl Visitor for AllPaths {
        fn enter(&mut self, _node: &Node, path: &NodePath) -> VisitFlow {
            self.0.push(path.clone());
            VisitFlow::Continue
        }
    }

    fn all_paths(ast: &Ast) -> Vec<NodePath> {
        let mut v = AllPaths(Vec::new());
        walk(ast, &mut v);
        v.0
    }

    #[test]
    fn removes_the_element() {
        let ast = simple_tree(&["a", "b", "c", "d"]);
        let after = Deletion::new(statement_path(0, 1)).unwrap().apply(&ast).unwrap();
        assert_eq!(statement_names(&after, 0), vec!["a", "c", "d"]);
        assert_eq!(statement_names(&ast, 0), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn path_maps() {
        let d = Deletion::new(statement_path(0, 1)).unwrap();
        assert_eq!(d.forward_map(&statement_path(0, 0)), Some(statement_path(0, 0)));
        assert_eq!(d.forward_map(&statement_path(0, 1)), None);
        assert_eq!(d.forward_map(&statement_path(0, 1).child_field("expression")), None);
        assert_eq!(d.forward_map(&statement_path(0, 3)), Some(statement_path(0, 2)));
        assert_eq!(
            d.forward_map(&statement_path(0, 2).child_field("expression")),
            Some(statement_path(0, 1).child_field("expression"))
        );
        assert_eq!(d.forward_map(&statements_path(0)), Some(statements_path(0)));
        assert_eq!(d.forward_map(&statement_path(1, 3)), Some(statement_path(1, 3)));

        assert_eq!(d.reverse_map(&statement_path(0, 1)), Some(statement_path(0, 2)));
        assert_eq!(d.reverse_map(&statement_path(0, 0)), Some(statement_path(0, 0)));
    }

    #[test]
    fn surviving_paths_address_the_same_nodes() {
        let ast = simple_tree(&["a", "b", "c", "d"]);
        let d = Deletion::new(statement_path(0, 2)).unwrap();
        let after = d.apply(&ast).unwrap();
        for p in all_paths(&ast) {
            match d.forward_map(&p) {
                Some(q) => {
                    let before = ast.node_at(&p).unwrap();
                    let moved = after.node_at(&q).unwrap();
                    if d.target().starts_with(&p) {
                        assert_eq!(before.ty(), moved.ty(), "{} -> {}", p, q);
                    } else {
                        assert!(before.canonical_eq(moved), "{} -> {}", p, q);
                    }
                    assert_eq!(d.reverse_map(&q), Some(p.clone()));
                }
                None => assert!(p.starts_with(d.target())),
            }
        }
    }

    #[test]
    fn rejects_non_list_targets() {
        assert_eq!(
            Deletion::new(path("body")),
            Err(MutationError::NotAListElement(path("body")))
        );
        let ast = simple_tree(&["a"]);
        assert!(Deletion::new(statement_path(0, 4)).unwrap().apply(&ast).is_err());
    }
}
