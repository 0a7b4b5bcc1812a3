use super::{apply_keyed_update, pick_weighted, Keyed, MutationSource};
use crate::fault_space::{EligibilityPolicy, FaultSpaceUpdate};
use crate::mutation::{Insertion, Mutation, MutationKind};
use crate::node_space::{GenerationContext, NodeGenerator, NodeSpace};
use rand::rngs::StdRng;
use rand::Rng;
use solmut_ast::{Ast, NodePath};
use std::collections::HashMap;
use std::sync::Arc;

/// One insertion position: before `index` in the list at `property`.
struct Slot {
    owner: NodePath,
    property: NodePath,
    index: usize,
    ctx: GenerationContext,
    types: Vec<String>,
    generators: HashMap<String, NodeGenerator>,
    weight: f64,
}

impl Keyed for Slot {
    fn key(&self) -> &NodePath {
        &self.owner
    }

    fn weight_mut(&mut self) -> &mut f64 {
        &mut self.weight
    }
}

/// Inserts generated nodes into the lists of fault-space nodes.
pub struct InsertionSource {
    ast: Ast,
    space: Arc<dyn NodeSpace>,
    policy: EligibilityPolicy,
    node_types: Vec<String>,
    slots: Vec<Slot>,
}

impl InsertionSource {
    /// `owners` are weighted paths of nodes whose list fields receive insertions.
    pub fn new(
        ast: &Ast,
        owners: Vec<(NodePath, f64)>,
        space: Arc<dyn NodeSpace>,
        policy: &EligibilityPolicy,
        node_types: Vec<String>,
    ) -> Self {
        let mut source = Self {
            ast: ast.clone(),
            space,
            policy: policy.clone(),
            node_types,
            slots: Vec::new(),
        };
        source.add(owners);
        source
    }

    fn add(&mut self, owners: Vec<(NodePath, f64)>) {
        for (owner, weight) in owners {
            if self.slots.iter().any(|s| s.owner == owner) || self.policy.mentions_disallowed_key(&owner) {
                continue;
            }
            let Some(node) = self.ast.node_at(&owner) else {
                continue;
            };
            let ctx = GenerationContext::at(&self.ast, &owner);
            for (field, len) in self.policy.insertable_fields(node) {
                let property = owner.child_field(field);
                for index in 0..=len {
                    self.slots.push(Slot {
                        owner: owner.clone(),
                        property: property.clone(),
                        index,
                        ctx: ctx.clone(),
                        types: self.node_types.clone(),
                        generators: HashMap::new(),
                        weight,
                    });
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Draw the next insertion without wrapping it.
    pub fn next_insertion(&mut self, rng: &mut StdRng) -> Option<Insertion> {
        loop {
            let weights: Vec<f64> = self.slots.iter().map(|s| s.weight).collect();
            let index = pick_weighted(rng, &weights)?;
            let slot = &mut self.slots[index];
            if slot.types.is_empty() {
                self.slots.swap_remove(index);
                continue;
            }
            let type_index = rng.gen_range(0..slot.types.len());
            let ty = slot.types[type_index].clone();

            if !slot.generators.contains_key(&ty) {
                match self.space.node_generator(&ty, &slot.ctx, rng.gen()) {
                    Some(generator) => {
                        slot.generators.insert(ty.clone(), generator);
                    }
                    None => {
                        slot.types.swap_remove(type_index);
                        continue;
                    }
                }
            }
            let next = slot.generators.get_mut(&ty).and_then(Iterator::next);
            match next {
                Some(node) => return Some(Insertion::new(slot.property.clone(), slot.index, node)),
                None => {
                    slot.generators.remove(&ty);
                    slot.types.swap_remove(type_index);
                }
            }
        }
    }
}

impl MutationSource for InsertionSource {
    fn next_mutation(&mut self, rng: &mut StdRng) -> Option<Mutation> {
        self.next_insertion(rng).map(Mutation::Insertion)
    }

    fn update(&mut self, update: &FaultSpaceUpdate) {
        match update {
            FaultSpaceUpdate::Add { paths, kinds } => {
                if kinds.contains(&MutationKind::Insertion) {
                    self.add(paths.iter().map(|p| (p.clone(), 1.0)).collect());
                }
            }
            other => apply_keyed_update(&mut self.slots, other),
        }
    }

    fn contains(&self, mutation: &Mutation) -> bool {
        let Mutation::Insertion(insertion) = mutation else {
            return false;
        };
        self.slots.iter().any(|slot| {
            &slot.property == insertion.property()
                && slot.index == insertion.index()
                && slot.types.iter().any(|t| insertion.node().is(t))
                && self.space.is_node_in_space(insertion.node(), &slot.ctx)
        })
    }
}
