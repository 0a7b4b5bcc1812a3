//! Fault spaces: which edit kinds are still available at which paths.

use crate::mutation::{Mutation, MutationKind};
use crate::node_space::SUPPORTED_NODE_TYPES;
use serde::{Deserialize, Serialize};
use solmut_ast::{Ast, Node, NodePath, Value};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Keys never descended into when looking for edit targets or insertion slots.
pub const DISALLOWED_KEYS: &[&str] = &[
    "range",
    "loc",
    "comments",
    "arguments",
    "parameters",
    "parameterTypes",
    "returnTypes",
    "modifiers",
    "names",
    "variables",
    "components",
    "members",
    "baseContracts",
    "symbolAliases",
    "operations",
    "cases",
    "returnArguments",
];

/// Callees whose call statements are never deleted.
pub const PROTECTED_CALLEES: &[&str] = &["assert", "require", "revert"];

/// Rules deciding where each edit kind may apply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityPolicy {
    pub deletable_node_types: Vec<String>,
    pub replaceable_node_types: Vec<String>,
    pub protected_callees: Vec<String>,
    pub disallowed_keys: BTreeSet<String>,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            deletable_node_types: vec!["ExpressionStatement".into()],
            replaceable_node_types: SUPPORTED_NODE_TYPES.iter().map(|s| s.to_string()).collect(),
            protected_callees: PROTECTED_CALLEES.iter().map(|s| s.to_string()).collect(),
            disallowed_keys: DISALLOWED_KEYS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EligibilityPolicy {
    pub fn is_disallowed_key(&self, key: &str) -> bool {
        self.disallowed_keys.contains(key)
    }

    pub fn mentions_disallowed_key(&self, path: &NodePath) -> bool {
        path.iter()
            .any(|s| s.as_field().is_some_and(|f| self.is_disallowed_key(f)))
    }

    /// A call to one of the protected callees, bare or as a statement.
    fn is_protected_call(&self, node: &Node) -> bool {
        let call = if node.is("ExpressionStatement") {
            match node.node_field("expression") {
                Some(expr) => expr,
                None => return false,
            }
        } else {
            node
        };
        call.is("FunctionCall")
            && call
                .node_field("expression")
                .filter(|callee| callee.is("Identifier"))
                .and_then(|callee| callee.str_field("name"))
                .is_some_and(|name| self.protected_callees.iter().any(|p| p == name))
    }

    pub fn is_deletable(&self, ast: &Ast, path: &NodePath) -> bool {
        let Some(node) = ast.node_at(path) else {
            return false;
        };
        let in_list = path
            .split_last_index()
            .and_then(|(list, _)| ast.get(&list).and_then(Value::as_list))
            .is_some();
        in_list
            && self.deletable_node_types.iter().any(|t| node.is(t))
            && !self.mentions_disallowed_key(path)
            && !self.is_protected_call(node)
            && !contains_non_empty_block(node)
    }

    pub fn is_replaceable(&self, ast: &Ast, path: &NodePath) -> bool {
        ast.node_at(path).is_some_and(|node| {
            self.replaceable_node_types.iter().any(|t| node.is(t))
                && !self.mentions_disallowed_key(path)
                && !contains_non_empty_block(node)
        })
    }

    /// Names of the list fields of `node` that may receive insertions.
    pub fn insertable_fields<'a>(&self, node: &'a Node) -> Vec<(&'a str, usize)> {
        node.fields()
            .iter()
            .filter(|(name, _)| !self.is_disallowed_key(name))
            .filter_map(|(name, value)| value.as_list().map(|items| (name.as_str(), items.len())))
            .collect()
    }

    pub fn is_insertable(&self, ast: &Ast, path: &NodePath) -> bool {
        !self.mentions_disallowed_key(path)
            && ast
                .node_at(path)
                .is_some_and(|node| !self.insertable_fields(node).is_empty())
    }

    /// Kinds among `kinds` that can apply at `path` of `ast`.
    pub fn eligible_kinds(
        &self,
        ast: &Ast,
        path: &NodePath,
        kinds: &BTreeSet<MutationKind>,
    ) -> BTreeSet<MutationKind> {
        kinds
            .iter()
            .copied()
            .filter(|kind| match kind {
                MutationKind::Deletion | MutationKind::Movement => self.is_deletable(ast, path),
                MutationKind::Replacement => self.is_replaceable(ast, path),
                MutationKind::Insertion => self.is_insertable(ast, path),
            })
            .collect()
    }
}

/// True if any `Block` with statements appears in the subtree.
pub fn contains_non_empty_block(node: &Node) -> bool {
    if node.is("Block") && node.list_field("statements").is_some_and(|s| !s.is_empty()) {
        return true;
    }
    node.fields().values().any(value_contains_non_empty_block)
}

fn value_contains_non_empty_block(value: &Value) -> bool {
    match value {
        Value::Node(node) => contains_non_empty_block(node),
        Value::List(items) => items.iter().any(value_contains_non_empty_block),
        Value::Object(map) => map.values().any(value_contains_non_empty_block),
        _ => false,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaultSpaceEntry {
    pub remaining: BTreeSet<MutationKind>,
    pub weight: f64,
}

impl FaultSpaceEntry {
    pub fn new(remaining: BTreeSet<MutationKind>) -> Self {
        Self {
            remaining,
            weight: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FaultSpaceUpdate {
    Add {
        paths: Vec<NodePath>,
        kinds: BTreeSet<MutationKind>,
    },
    Remove(Vec<NodePath>),
    Intersect(Vec<NodePath>),
    UpdateWeight {
        paths: Vec<NodePath>,
        weight: f64,
    },
}

/// The set of paths still open for edits, each with the kinds left to try.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultSpace {
    entries: BTreeMap<NodePath, FaultSpaceEntry>,
}

impl FaultSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every path with the same kinds, without checking eligibility.
    pub fn uniform(paths: impl IntoIterator<Item = NodePath>, kinds: &BTreeSet<MutationKind>) -> Self {
        Self {
            entries: paths
                .into_iter()
                .map(|p| (p, FaultSpaceEntry::new(kinds.clone())))
                .collect(),
        }
    }

    /// Paths of `ast` with the kinds of `kinds` that the policy allows there.
    pub fn build(
        ast: &Ast,
        paths: impl IntoIterator<Item = NodePath>,
        kinds: &BTreeSet<MutationKind>,
        policy: &EligibilityPolicy,
    ) -> Self {
        let mut space = Self::new();
        space.update(
            ast,
            policy,
            &FaultSpaceUpdate::Add {
                paths: paths.into_iter().collect(),
                kinds: kinds.clone(),
            },
        );
        space
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &NodePath) -> Option<&FaultSpaceEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&NodePath, &FaultSpaceEntry)> {
        self.entries.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &NodePath> {
        self.entries.keys()
    }

    /// Weighted paths whose remaining kinds include `kind`.
    pub fn candidates(&self, kind: MutationKind) -> Vec<(NodePath, f64)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.remaining.contains(&kind))
            .map(|(p, e)| (p.clone(), e.weight))
            .collect()
    }

    /// Union of all remaining kinds.
    pub fn kinds(&self) -> BTreeSet<MutationKind> {
        self.entries
            .values()
            .flat_map(|e| e.remaining.iter().copied())
            .collect()
    }

    pub fn update(&mut self, ast: &Ast, policy: &EligibilityPolicy, update: &FaultSpaceUpdate) {
        match update {
            FaultSpaceUpdate::Add { paths, kinds } => {
                for path in paths {
                    if self.entries.contains_key(path) {
                        continue;
                    }
                    let remaining = policy.eligible_kinds(ast, path, kinds);
                    if !remaining.is_empty() {
                        self.entries.insert(path.clone(), FaultSpaceEntry::new(remaining));
                    }
                }
            }
            FaultSpaceUpdate::Remove(paths) => {
                for path in paths {
                    self.entries.remove(path);
                }
            }
            FaultSpaceUpdate::Intersect(paths) => {
                let keep: HashSet<&NodePath> = paths.iter().collect();
                self.entries.retain(|p, _| keep.contains(p));
            }
            FaultSpaceUpdate::UpdateWeight { paths, weight } => {
                for path in paths {
                    if let Some(entry) = self.entries.get_mut(path) {
                        entry.weight = *weight;
                    }
                }
            }
        }
    }

    /// The fault space of the tree produced by `mutation`.
    pub fn translate(&self, mutation: &Mutation) -> FaultSpace {
        let target = mutation.target_node_path();
        let kind = mutation.kind();
        let mut entries: BTreeMap<NodePath, FaultSpaceEntry> = BTreeMap::new();
        for (path, entry) in &self.entries {
            let mut entry = entry.clone();
            if *path == target {
                entry.remaining.remove(&kind);
                if entry.remaining.is_empty() {
                    continue;
                }
            }
            let Some(mapped) = mutation.forward_map(path) else {
                continue;
            };
            match entries.get_mut(&mapped) {
                Some(existing) => existing.remaining.extend(entry.remaining),
                None => {
                    entries.insert(mapped, entry);
                }
            }
        }
        FaultSpace { entries }
    }

    /// Move every entry through `map`, keeping its kinds. Entries mapped to
    /// `None` are dropped; collisions union their kinds.
    pub fn map_paths<F>(&self, mut map: F) -> FaultSpace
    where
        F: FnMut(&NodePath) -> Option<NodePath>,
    {
        let mut entries: BTreeMap<NodePath, FaultSpaceEntry> = BTreeMap::new();
        for (path, entry) in &self.entries {
            let Some(mapped) = map(path) else {
                continue;
            };
            match entries.get_mut(&mapped) {
                Some(existing) => existing.remaining.extend(entry.remaining.iter().copied()),
                None => {
                    entries.insert(mapped, entry.clone());
                }
            }
        }
        FaultSpace { entries }
    }
}
