use super::{apply_keyed_update, InsertionSource, Keyed, MutationSource};
use crate::fault_space::{EligibilityPolicy, FaultSpace, FaultSpaceUpdate};
use crate::mutation::{Deletion, Movement, Mutation, MutationKind};
use crate::node_space::SeededNodeSpace;
use rand::rngs::StdRng;
use rand::Rng;
use solmut_ast::{scope_of, Ast, NodePath};
use std::sync::Arc;
use tracing::trace;

/// A source statement and the positions it may move to.
struct Pair {
    deletion: Deletion,
    /// Built on first use, over the tree with the source removed.
    destinations: Option<InsertionSource>,
    weight: f64,
}

impl Keyed for Pair {
    fn key(&self) -> &NodePath {
        self.deletion.target()
    }

    fn weight_mut(&mut self) -> &mut f64 {
        &mut self.weight
    }
}

/// Moves deletable statements to other list positions.
pub struct MovementSource {
    ast: Ast,
    policy: EligibilityPolicy,
    only_same_function: bool,
    /// Owners of destination lists: every fault-space path plus the nodes
    /// holding the movable statements.
    paths: Vec<NodePath>,
    pairs: Vec<Pair>,
}

impl MovementSource {
    pub fn new(ast: &Ast, fault_space: &FaultSpace, policy: &EligibilityPolicy, only_same_function: bool) -> Self {
        let mut source = Self {
            ast: ast.clone(),
            policy: policy.clone(),
            only_same_function,
            paths: fault_space.paths().cloned().collect(),
            pairs: Vec::new(),
        };
        source.add(fault_space.candidates(MutationKind::Movement));
        source
    }

    fn add(&mut self, entries: Vec<(NodePath, f64)>) {
        for (path, weight) in entries {
            if self.pairs.iter().any(|p| p.deletion.target() == &path) || !self.policy.is_deletable(&self.ast, &path) {
                continue;
            }
            if let Some(owner) = self.ast.nearest_node_ancestor(&path) {
                if !self.paths.contains(&owner) {
                    self.paths.push(owner);
                }
            }
            if let Ok(deletion) = Deletion::new(path) {
                self.pairs.push(Pair {
                    deletion,
                    destinations: None,
                    weight,
                });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Insertion positions for the node removed by `deletion`, in the
    /// coordinates of the tree after the deletion.
    fn destinations_for(&self, deletion: &Deletion) -> Option<InsertionSource> {
        let node = self.ast.node_at(deletion.target())?.clone();
        let after = deletion.apply(&self.ast).ok()?;

        let scope = scope_of(&self.ast, deletion.target());
        let restrict = self.only_same_function && scope.function.is_some();
        let owners: Vec<(NodePath, f64)> = self
            .paths
            .iter()
            .filter(|p| !restrict || scope.admits(&scope_of(&self.ast, p)))
            .filter_map(|p| deletion.forward_map(p))
            .map(|p| (p, 1.0))
            .collect();

        let ty = node.ty().to_string();
        Some(InsertionSource::new(
            &after,
            owners,
            Arc::new(SeededNodeSpace::new([node])),
            &self.policy,
            vec![ty],
        ))
    }
}

impl MutationSource for MovementSource {
    fn next_mutation(&mut self, rng: &mut StdRng) -> Option<Mutation> {
        while !self.pairs.is_empty() {
            let index = rng.gen_range(0..self.pairs.len());
            if self.pairs[index].destinations.is_none() {
                let built = self.destinations_for(&self.pairs[index].deletion);
                match built {
                    Some(destinations) => self.pairs[index].destinations = Some(destinations),
                    None => {
                        self.pairs.swap_remove(index);
                        continue;
                    }
                }
            }
            let pair = &mut self.pairs[index];
            let Some(insertion) = pair.destinations.as_mut().and_then(|d| d.next_insertion(rng)) else {
                self.pairs.swap_remove(index);
                continue;
            };
            if &insertion.slot() == pair.deletion.target() {
                continue;
            }
            match Movement::from_parts(&self.ast, &pair.deletion, &insertion) {
                Ok(movement) => return Some(movement.into()),
                Err(e) => trace!(error = %e, "skipping movement"),
            }
        }
        None
    }

    fn update(&mut self, update: &FaultSpaceUpdate) {
        match update {
            FaultSpaceUpdate::Add { paths, kinds } => {
                for path in paths {
                    if !self.paths.contains(path) {
                        self.paths.push(path.clone());
                    }
                }
                if kinds.contains(&MutationKind::Movement) {
                    self.add(paths.iter().map(|p| (p.clone(), 1.0)).collect());
                }
            }
            other => apply_keyed_update(&mut self.pairs, other),
        }
    }

    fn contains(&self, mutation: &Mutation) -> bool {
        let Mutation::Movement(movement) = mutation else {
            return false;
        };
        let Some(pair) = self.pairs.iter().find(|p| p.deletion == *movement.deletion()) else {
            return false;
        };
        let insertion = Mutation::Insertion(movement.insertion().clone());
        match &pair.destinations {
            Some(destinations) => destinations.contains(&insertion),
            None => self
                .destinations_for(&pair.deletion)
                .is_some_and(|d| d.contains(&insertion)),
        }
    }
}
