use super::{apply_keyed_update, pick_weighted, Keyed, MutationSource};
use crate::fault_space::{EligibilityPolicy, FaultSpace, FaultSpaceUpdate};
use crate::mutation::{Mutation, MutationKind, Replacement};
use crate::node_space::{GenerationContext, NodeGenerator, NodeSpace};
use rand::rngs::StdRng;
use rand::Rng;
use solmut_ast::{Ast, NodePath};
use std::collections::HashMap;
use std::sync::Arc;

struct Target {
    path: NodePath,
    ctx: GenerationContext,
    types: Vec<String>,
    generators: HashMap<String, NodeGenerator>,
    weight: f64,
}

impl Keyed for Target {
    fn key(&self) -> &NodePath {
        &self.path
    }

    fn weight_mut(&mut self) -> &mut f64 {
        &mut self.weight
    }
}

/// Swaps replaceable nodes for generated ones of any offered type.
pub struct ReplacementSource {
    ast: Ast,
    space: Arc<dyn NodeSpace>,
    policy: EligibilityPolicy,
    node_types: Vec<String>,
    targets: Vec<Target>,
}

impl ReplacementSource {
    pub fn new(
        ast: &Ast,
        fault_space: &FaultSpace,
        space: Arc<dyn NodeSpace>,
        policy: &EligibilityPolicy,
        node_types: Vec<String>,
    ) -> Self {
        let mut source = Self {
            ast: ast.clone(),
            space,
            policy: policy.clone(),
            node_types,
            targets: Vec::new(),
        };
        source.add(fault_space.candidates(MutationKind::Replacement));
        source
    }

    fn add(&mut self, entries: Vec<(NodePath, f64)>) {
        if self.node_types.is_empty() {
            return;
        }
        for (path, weight) in entries {
            if self.targets.iter().any(|t| t.path == path) || !self.policy.is_replaceable(&self.ast, &path) {
                continue;
            }
            self.targets.push(Target {
                ctx: GenerationContext::at(&self.ast, &path),
                path,
                types: self.node_types.clone(),
                generators: HashMap::new(),
                weight,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl MutationSource for ReplacementSource {
    fn next_mutation(&mut self, rng: &mut StdRng) -> Option<Mutation> {
        loop {
            let weights: Vec<f64> = self.targets.iter().map(|t| t.weight).collect();
            let index = pick_weighted(rng, &weights)?;
            let target = &mut self.targets[index];
            if target.types.is_empty() {
                self.targets.swap_remove(index);
                continue;
            }
            let type_index = rng.gen_range(0..target.types.len());
            let ty = target.types[type_index].clone();

            if !target.generators.contains_key(&ty) {
                match self.space.node_generator(&ty, &target.ctx, rng.gen()) {
                    Some(generator) => {
                        target.generators.insert(ty.clone(), generator);
                    }
                    None => {
                        target.types.swap_remove(type_index);
                        continue;
                    }
                }
            }
            match target.generators.get_mut(&ty).and_then(Iterator::next) {
                Some(node) => return Some(Replacement::new(target.path.clone(), node).into()),
                None => {
                    target.generators.remove(&ty);
                    target.types.swap_remove(type_index);
                }
            }
        }
    }

    fn update(&mut self, update: &FaultSpaceUpdate) {
        match update {
            FaultSpaceUpdate::Add { paths, kinds } => {
                if kinds.contains(&MutationKind::Replacement) {
                    self.add(paths.iter().map(|p| (p.clone(), 1.0)).collect());
                }
            }
            other => apply_keyed_update(&mut self.targets, other),
        }
    }

    fn contains(&self, mutation: &Mutation) -> bool {
        let Mutation::Replacement(replacement) = mutation else {
            return false;
        };
        self.targets.iter().any(|target| {
            &target.path == replacement.target()
                && target.types.iter().any(|t| replacement.node().is(t))
                && self.space.is_node_in_space(replacement.node(), &target.ctx)
        })
    }
}
