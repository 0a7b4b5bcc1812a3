use super::{apply_keyed_update, pick_weighted, Keyed, MutationSource};
use crate::fault_space::{EligibilityPolicy, FaultSpace, FaultSpaceUpdate};
use crate::mutation::{Deletion, Mutation, MutationKind};
use rand::rngs::StdRng;
use solmut_ast::{Ast, NodePath};

struct Candidate {
    path: NodePath,
    weight: f64,
}

impl Keyed for Candidate {
    fn key(&self) -> &NodePath {
        &self.path
    }

    fn weight_mut(&mut self) -> &mut f64 {
        &mut self.weight
    }
}

/// Deletes each eligible statement once.
pub struct DeletionSource {
    ast: Ast,
    policy: EligibilityPolicy,
    candidates: Vec<Candidate>,
}

impl DeletionSource {
    pub fn new(ast: &Ast, fault_space: &FaultSpace, policy: &EligibilityPolicy) -> Self {
        let mut source = Self {
            ast: ast.clone(),
            policy: policy.clone(),
            candidates: Vec::new(),
        };
        source.add(
            fault_space
                .candidates(MutationKind::Deletion)
                .into_iter(),
        );
        source
    }

    fn add(&mut self, entries: impl Iterator<Item = (NodePath, f64)>) {
        for (path, weight) in entries {
            if self.policy.is_deletable(&self.ast, &path) && !self.candidates.iter().any(|c| c.path == path) {
                self.candidates.push(Candidate { path, weight });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Draw the next deletion without wrapping it.
    pub fn next_deletion(&mut self, rng: &mut StdRng) -> Option<Deletion> {
        loop {
            let weights: Vec<f64> = self.candidates.iter().map(|c| c.weight).collect();
            let index = pick_weighted(rng, &weights)?;
            let chosen = self.candidates.swap_remove(index);
            if let Ok(deletion) = Deletion::new(chosen.path) {
                return Some(deletion);
            }
        }
    }
}

impl MutationSource for DeletionSource {
    fn next_mutation(&mut self, rng: &mut StdRng) -> Option<Mutation> {
        self.next_deletion(rng).map(Mutation::Deletion)
    }

    fn update(&mut self, update: &FaultSpaceUpdate) {
        match update {
            FaultSpaceUpdate::Add { paths, kinds } => {
                if kinds.contains(&MutationKind::Deletion) {
                    self.add(paths.iter().map(|p| (p.clone(), 1.0)));
                }
            }
            other => apply_keyed_update(&mut self.candidates, other),
        }
    }

    fn contains(&self, mutation: &Mutation) -> bool {
        match mutation {
            Mutation::Deletion(d) => self.candidates.iter().any(|c| &c.path == d.target()),
            _ => false,
        }
    }
}
