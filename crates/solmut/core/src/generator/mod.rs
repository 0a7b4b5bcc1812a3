//! Random mutation generation.
//!
//! Each edit kind has its own [`MutationSource`] that owns the remaining
//! candidates for that kind. [`RandomMutationGenerator`] picks a kind at
//! random among those still available and asks the matching source.

mod deletion;
mod insertion;
mod movement;
mod replacement;

pub use deletion::DeletionSource;
pub use insertion::InsertionSource;
pub use movement::MovementSource;
pub use replacement::ReplacementSource;

use crate::fault_space::{EligibilityPolicy, FaultSpace, FaultSpaceUpdate};
use crate::mutation::{Mutation, MutationKind};
use crate::node_space::{NodeSpace, RandomNodeSpace, SUPPORTED_NODE_TYPES};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use solmut_ast::{Ast, NodePath};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// A source of edits of one kind over one tree.
pub trait MutationSource: Send {
    /// Draw the next edit, or `None` once the source is exhausted.
    fn next_mutation(&mut self, rng: &mut StdRng) -> Option<Mutation>;

    fn update(&mut self, update: &FaultSpaceUpdate);

    /// True if `mutation` is still among the edits this source could return.
    fn contains(&self, mutation: &Mutation) -> bool;
}

/// Knobs shared by every source of a generator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub policy: EligibilityPolicy,
    /// Node types offered for insertion and replacement.
    pub new_node_types: Vec<String>,
    /// Keep moved statements inside their function.
    pub only_same_function: bool,
    pub kinds: BTreeSet<MutationKind>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            policy: EligibilityPolicy::default(),
            new_node_types: SUPPORTED_NODE_TYPES.iter().map(|s| s.to_string()).collect(),
            only_same_function: true,
            kinds: MutationKind::ALL.into_iter().collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Proposal {
    Mutation(Mutation),
    /// Kinds remain, but none of the requested ones.
    RequestNotFulfilled,
    Exhausted,
}

/// Draws edits of every enabled kind for one tree.
pub struct RandomMutationGenerator {
    rng: StdRng,
    sources: BTreeMap<MutationKind, Box<dyn MutationSource>>,
}

impl RandomMutationGenerator {
    pub fn new(ast: &Ast, fault_space: &FaultSpace, settings: &GeneratorSettings, seed: u64) -> Self {
        let kinds: BTreeSet<MutationKind> = settings
            .kinds
            .intersection(&fault_space.kinds())
            .copied()
            .collect();
        let needs_nodes = kinds.contains(&MutationKind::Insertion) || kinds.contains(&MutationKind::Replacement);
        let node_space: Option<Arc<dyn NodeSpace>> = needs_nodes.then(|| Arc::new(RandomNodeSpace::new(ast)) as Arc<dyn NodeSpace>);

        let mut sources: BTreeMap<MutationKind, Box<dyn MutationSource>> = BTreeMap::new();
        for kind in kinds {
            let source: Box<dyn MutationSource> = match (kind, &node_space) {
                (MutationKind::Deletion, _) => Box::new(DeletionSource::new(ast, fault_space, &settings.policy)),
                (MutationKind::Movement, _) => Box::new(MovementSource::new(
                    ast,
                    fault_space,
                    &settings.policy,
                    settings.only_same_function,
                )),
                (MutationKind::Insertion, Some(space)) => Box::new(InsertionSource::new(
                    ast,
                    fault_space.candidates(MutationKind::Insertion),
                    Arc::clone(space),
                    &settings.policy,
                    settings.new_node_types.clone(),
                )),
                (MutationKind::Replacement, Some(space)) => Box::new(ReplacementSource::new(
                    ast,
                    fault_space,
                    Arc::clone(space),
                    &settings.policy,
                    settings.new_node_types.clone(),
                )),
                (_, None) => continue,
            };
            sources.insert(kind, source);
        }

        Self {
            rng: StdRng::seed_from_u64(seed),
            sources,
        }
    }

    /// Kinds that have not been exhausted yet.
    pub fn remaining_kinds(&self) -> BTreeSet<MutationKind> {
        self.sources.keys().copied().collect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn update(&mut self, update: &FaultSpaceUpdate) {
        for source in self.sources.values_mut() {
            source.update(update);
        }
    }

    /// Draw an edit whose kind is in `allowed` (any kind when `None`).
    /// `restrict_to` permanently narrows every source to those paths first.
    pub fn next(&mut self, allowed: Option<&BTreeSet<MutationKind>>, restrict_to: Option<&[NodePath]>) -> Proposal {
        if let Some(paths) = restrict_to {
            self.update(&FaultSpaceUpdate::Intersect(paths.to_vec()));
        }
        loop {
            if self.sources.is_empty() {
                return Proposal::Exhausted;
            }
            let kinds: Vec<MutationKind> = self
                .sources
                .keys()
                .copied()
                .filter(|k| allowed.map_or(true, |a| a.contains(k)))
                .collect();
            if kinds.is_empty() {
                return Proposal::RequestNotFulfilled;
            }
            let kind = kinds[self.rng.gen_range(0..kinds.len())];
            let Some(source) = self.sources.get_mut(&kind) else {
                continue;
            };
            match source.next_mutation(&mut self.rng) {
                Some(mutation) => return Proposal::Mutation(mutation),
                None => {
                    debug!(%kind, "mutation source exhausted");
                    self.sources.remove(&kind);
                }
            }
        }
    }

    pub fn contains(&self, mutation: &Mutation) -> bool {
        self.sources
            .get(&mutation.kind())
            .is_some_and(|source| source.contains(mutation))
    }
}

/// Index drawn with probability proportional to its weight. Falls back to a
/// uniform draw when the weights cannot form a distribution.
pub(crate) fn pick_weighted(rng: &mut StdRng, weights: &[f64]) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }
    match WeightedIndex::new(weights) {
        Ok(dist) => Some(dist.sample(rng)),
        Err(_) => Some(rng.gen_range(0..weights.len())),
    }
}

/// A candidate addressed by a fault-space path.
pub(crate) trait Keyed {
    fn key(&self) -> &NodePath;
    fn weight_mut(&mut self) -> &mut f64;
}

/// Apply the removal, intersection and weight updates. Additions depend on
/// the source and are left to the caller.
pub(crate) fn apply_keyed_update<T: Keyed>(items: &mut Vec<T>, update: &FaultSpaceUpdate) {
    match update {
        FaultSpaceUpdate::Add { .. } => {}
        FaultSpaceUpdate::Remove(paths) => {
            let drop: HashSet<&NodePath> = paths.iter().collect();
            items.retain(|item| !drop.contains(item.key()));
        }
        FaultSpaceUpdate::Intersect(paths) => {
            let keep: HashSet<&NodePath> = paths.iter().collect();
            items.retain(|item| keep.contains(item.key()));
        }
        FaultSpaceUpdate::UpdateWeight { paths, weight } => {
            let hit: HashSet<&NodePath> = paths.iter().collect();
            for item in items.iter_mut().filter(|item| hit.contains(item.key())) {
                *item.weight_mut() = *weight;
            }
        }
    }
}
