//! Edit histories.

use crate::error::MutationError;
use crate::mutation::{LocMap, ModifiedLocations, Mutation, MutationKind};
use serde::{Deserialize, Serialize};
use solmut_ast::{Ast, NodePath};
use std::collections::BTreeSet;
use std::ops::ControlFlow;

/// An ordered list of edits, applied left to right starting at the origin.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationSequence(Vec<Mutation>);

impl MutationSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Mutation] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&Mutation> {
        self.0.get(index)
    }

    pub fn last(&self) -> Option<&Mutation> {
        self.0.last()
    }

    pub fn push(&mut self, mutation: Mutation) {
        self.0.push(mutation);
    }

    /// Copy with one more step.
    pub fn extended(&self, mutation: Mutation) -> Self {
        let mut out = self.clone();
        out.push(mutation);
        out
    }

    /// The first `len` steps.
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Everything after the first `len` steps.
    pub fn suffix(&self, len: usize) -> &[Mutation] {
        &self.0[len.min(self.0.len())..]
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn kinds(&self) -> BTreeSet<MutationKind> {
        self.0.iter().map(Mutation::kind).collect()
    }

    /// Map an origin path to the tree after the whole sequence.
    pub fn update_path(&self, path: &NodePath) -> Option<NodePath> {
        self.0
            .iter()
            .try_fold(path.clone(), |p, m| m.forward_map(&p))
    }

    /// Map a path of the final tree back to the origin.
    pub fn reverse_path(&self, path: &NodePath) -> Option<NodePath> {
        self.0
            .iter()
            .rev()
            .try_fold(path.clone(), |p, m| m.reverse_map(&p))
    }

    /// Carry a path written after `from_prefix` over to the tree after `to_prefix`.
    pub fn rebase_path(
        path: &NodePath,
        from_prefix: &MutationSequence,
        to_prefix: &MutationSequence,
    ) -> Option<NodePath> {
        from_prefix
            .reverse_path(path)
            .and_then(|p| to_prefix.update_path(&p))
    }

    pub fn apply(&self, origin: &Ast) -> Result<Ast, MutationError> {
        self.replay(origin, |_, _, _| ControlFlow::Continue(()))
    }

    /// Apply the steps in order, calling `visit(tree_before, step, index)`
    /// before each one. Stops early when `visit` breaks and returns the tree
    /// reached so far.
    pub fn replay<F>(&self, origin: &Ast, mut visit: F) -> Result<Ast, MutationError>
    where
        F: FnMut(&Ast, &Mutation, usize) -> ControlFlow<()>,
    {
        let mut tree = origin.clone();
        for (i, m) in self.0.iter().enumerate() {
            if visit(&tree, m, i).is_break() {
                break;
            }
            tree = m.apply(&tree)?;
        }
        Ok(tree)
    }

    /// Source spans touched by the whole history. Spans of nodes created by
    /// earlier steps are resolved through the paths those steps recorded.
    pub fn modified_locations(&self, origin: &Ast) -> Result<ModifiedLocations, MutationError> {
        let mut recorded = LocMap::new();
        let mut collected = Vec::new();
        let mut unknown = false;
        self.replay(origin, |tree, m, _| match m.modified_locations(tree, &recorded) {
            ModifiedLocations::Known(locs) => {
                for p in m.modified_node_paths() {
                    recorded.insert(p, locs.clone());
                }
                for loc in locs {
                    if !collected.contains(&loc) {
                        collected.push(loc);
                    }
                }
                ControlFlow::Continue(())
            }
            ModifiedLocations::Unknown => {
                unknown = true;
                ControlFlow::Break(())
            }
        })?;
        Ok(if unknown {
            ModifiedLocations::Unknown
        } else {
            ModifiedLocations::Known(collected)
        })
    }

    /// Paths of the final tree holding values created by the sequence.
    pub fn modified_node_paths(&self, origin: &Ast) -> Result<Vec<NodePath>, MutationError> {
        let mut paths: Vec<NodePath> = Vec::new();
        self.replay(origin, |_, m, _| {
            paths = paths.iter().filter_map(|p| m.forward_map(p)).collect();
            paths.extend(m.modified_node_paths());
            ControlFlow::Continue(())
        })?;
        Ok(paths)
    }
}

impl From<Vec<Mutation>> for MutationSequence {
    fn from(steps: Vec<Mutation>) -> Self {
        Self(steps)
    }
}

impl FromIterator<Mutation> for MutationSequence {
    fn from_iter<I: IntoIterator<Item = Mutation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MutationSequence {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
