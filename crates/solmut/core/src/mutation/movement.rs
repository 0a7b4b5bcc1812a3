use super::{Deletion, Insertion, LocMap, ModifiedLocations, Mutation};
use crate::error::MutationError;
use crate::sequence::MutationSequence;
use serde::{Deserialize, Serialize};
use solmut_ast::{Ast, NodePath};

/// Move a list element to another list position: a deletion of the source
/// followed by an insertion of the same node.
///
/// A movement remembers the tree it was built against and refuses to apply
/// anywhere else, since its destination is expressed in that tree's
/// post-deletion coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MovementRepr", into = "MovementRepr")]
pub struct Movement {
    ast: Ast,
    from: NodePath,
    to_property: NodePath,
    insert_index: usize,
    deletion: Deletion,
    insertion: Insertion,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MovementRepr {
    ast: Ast,
    from_node_path: NodePath,
    to_property_path: NodePath,
    insert_index: usize,
}

impl TryFrom<MovementRepr> for Movement {
    type Error = MutationError;

    fn try_from(repr: MovementRepr) -> Result<Self, Self::Error> {
        Movement::new(
            &repr.ast,
            repr.from_node_path,
            repr.to_property_path,
            repr.insert_index,
        )
    }
}

impl From<Movement> for MovementRepr {
    fn from(m: Movement) -> Self {
        MovementRepr {
            ast: m.ast.without_location(),
            from_node_path: m.from,
            to_property_path: m.to_property,
            insert_index: m.insert_index,
        }
    }
}

impl Movement {
    /// `to_property`/`insert_index` name the destination in the coordinates
    /// of `ast`, before the source is removed.
    pub fn new(
        ast: &Ast,
        from: NodePath,
        to_property: NodePath,
        insert_index: usize,
    ) -> Result<Self, MutationError> {
        let ast = ast.without_fields(&["tokens"]);
        let node = ast
            .node_at(&from)
            .ok_or_else(|| MutationError::MissingSource(from.clone()))?
            .without_location();
        let deletion = Deletion::new(from.clone())?;

        // The slot right at the source is still the source position once it is removed.
        let destination = to_property.child_index(insert_index);
        let slot = if destination == from {
            from.clone()
        } else {
            deletion
                .forward_map(&destination)
                .ok_or_else(|| MutationError::InvalidDestination(destination.clone()))?
        };
        if slot == from {
            return Err(MutationError::NoOpMovement(from));
        }
        let (property, index) = slot
            .split_last_index()
            .ok_or(MutationError::InvalidDestination(destination))?;

        Ok(Self {
            ast,
            from,
            to_property,
            insert_index,
            deletion,
            insertion: Insertion::new(property, index, node),
        })
    }

    /// Rebuild a movement from a deletion and an insertion whose slot is in
    /// post-deletion coordinates.
    pub fn from_parts(ast: &Ast, deletion: &Deletion, insertion: &Insertion) -> Result<Self, MutationError> {
        let slot = insertion.slot();
        let original = deletion
            .reverse_map(&slot)
            .ok_or_else(|| MutationError::InvalidDestination(slot.clone()))?;
        let (to_property, index) = original
            .split_last_index()
            .ok_or(MutationError::InvalidDestination(slot))?;
        Movement::new(ast, deletion.target().clone(), to_property, index)
    }

    pub fn from(&self) -> &NodePath {
        &self.from
    }

    pub fn to_property(&self) -> &NodePath {
        &self.to_property
    }

    pub fn insert_index(&self) -> usize {
        self.insert_index
    }

    pub fn deletion(&self) -> &Deletion {
        &self.deletion
    }

    pub fn insertion(&self) -> &Insertion {
        &self.insertion
    }

    pub fn apply(&self, ast: &Ast) -> Result<Ast, MutationError> {
        if !ast.canonical_eq(&self.ast) {
            return Err(MutationError::TreeMismatch);
        }
        let intermediate = self.deletion.apply(ast)?;
        self.insertion.apply(&intermediate)
    }

    pub fn forward_map(&self, path: &NodePath) -> Option<NodePath> {
        match self.deletion.forward_map(path) {
            Some(p) => self.insertion.forward_map(&p),
            None if *path == self.from => Some(self.insertion.slot()),
            None => None,
        }
    }

    pub fn reverse_map(&self, path: &NodePath) -> Option<NodePath> {
        if *path == self.insertion.slot() {
            return Some(self.from.clone());
        }
        self.insertion
            .reverse_map(path)
            .and_then(|p| self.deletion.reverse_map(&p))
    }

    pub fn modified_locations(&self, ast: &Ast, locs: &LocMap) -> ModifiedLocations {
        let removed = self.deletion.modified_locations(ast, locs);
        let Ok(intermediate) = self.deletion.apply(ast) else {
            return ModifiedLocations::Unknown;
        };
        let shifted: LocMap = locs
            .iter()
            .filter_map(|(p, v)| self.deletion.forward_map(p).map(|q| (q, v.clone())))
            .collect();
        removed.union(self.insertion.modified_locations(&intermediate, &shifted))
    }

    pub(super) fn rebase(
        &self,
        from_prefix: &MutationSequence,
        to_prefix: &MutationSequence,
        to_tree: &Ast,
    ) -> Option<Movement> {
        let source = MutationSequence::rebase_path(&self.from, from_prefix, to_prefix)?;
        let deletion = Deletion::new(source).ok()?;
        deletion.apply(to_tree).ok()?;

        let from_extended = from_prefix.extended(Mutation::Deletion(self.deletion.clone()));
        let to_extended = to_prefix.extended(Mutation::Deletion(deletion.clone()));
        let slot = MutationSequence::rebase_path(&self.insertion.slot(), &from_extended, &to_extended)?;
        let (property, index) = slot.split_last_index()?;
        let insertion = Insertion::new(property, index, self.insertion.node().clone());

        Movement::from_parts(to_tree, &deletion, &insertion).ok()
    }
}
