//! The four edit kinds.
//!
//! Every edit maps paths of the tree before it to paths of the tree after it
//! (`forward_map`) and back (`reverse_map`). `None` marks a path whose value
//! does not survive the edit. Composing these maps over a history is what
//! lets fault spaces follow the tree and lets crossover move edits from one
//! history onto another.

mod deletion;
mod insertion;
mod movement;
mod replacement;

pub use deletion::Deletion;
pub use insertion::Insertion;
pub use movement::Movement;
pub use replacement::Replacement;

use crate::error::MutationError;
use crate::sequence::MutationSequence;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solmut_ast::{Ast, CodeRange, Node, NodePath};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Locations recorded against paths of intermediate trees. Nodes created by
/// earlier edits carry no `loc`, so their positions are looked up here.
pub type LocMap = HashMap<NodePath, Vec<CodeRange>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    #[serde(rename = "InsertionM")]
    Insertion,
    #[serde(rename = "DeletionM")]
    Deletion,
    #[serde(rename = "ReplacementM")]
    Replacement,
    #[serde(rename = "MovementM")]
    Movement,
}

impl MutationKind {
    pub const ALL: [MutationKind; 4] = [
        MutationKind::Insertion,
        MutationKind::Deletion,
        MutationKind::Replacement,
        MutationKind::Movement,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Insertion => "InsertionM",
            MutationKind::Deletion => "DeletionM",
            MutationKind::Replacement => "ReplacementM",
            MutationKind::Movement => "MovementM",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the wire names (`DeletionM`) and plain names (`deletion`).
impl FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insertion" | "insertionm" => Ok(MutationKind::Insertion),
            "deletion" | "deletionm" => Ok(MutationKind::Deletion),
            "replacement" | "replacementm" => Ok(MutationKind::Replacement),
            "movement" | "movementm" => Ok(MutationKind::Movement),
            _ => Err(format!("unknown mutation kind '{}'", s)),
        }
    }
}

/// Source spans touched by an edit, or `Unknown` when they cannot be told.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModifiedLocations {
    Known(Vec<CodeRange>),
    Unknown,
}

impl ModifiedLocations {
    /// `Unknown` if either side is; otherwise both lists without repeats.
    pub fn union(self, other: ModifiedLocations) -> ModifiedLocations {
        match (self, other) {
            (ModifiedLocations::Known(mut a), ModifiedLocations::Known(b)) => {
                for loc in b {
                    if !a.contains(&loc) {
                        a.push(loc);
                    }
                }
                ModifiedLocations::Known(a)
            }
            _ => ModifiedLocations::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ModifiedLocations::Known(_))
    }
}

impl Serialize for ModifiedLocations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModifiedLocations::Known(locs) => locs.serialize(serializer),
            ModifiedLocations::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for ModifiedLocations {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Known(Vec<CodeRange>),
            Tag(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Known(locs) => Ok(ModifiedLocations::Known(locs)),
            Repr::Tag(tag) if tag == "unknown" => Ok(ModifiedLocations::Unknown),
            Repr::Tag(tag) => Err(serde::de::Error::custom(format!(
                "expected a location list or \"unknown\", got \"{}\"",
                tag
            ))),
        }
    }
}

/// Locations of the anchor node of an edit: its own `loc`, else whatever was
/// recorded for the anchor path.
pub(crate) fn anchor_locations(anchor: Option<&Node>, path: &NodePath, locs: &LocMap) -> ModifiedLocations {
    if let Some(loc) = anchor.and_then(Node::loc) {
        return ModifiedLocations::Known(vec![*loc]);
    }
    match locs.get(path) {
        Some(recorded) => ModifiedLocations::Known(recorded.clone()),
        None => ModifiedLocations::Unknown,
    }
}

/// One edit. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mutationType")]
pub enum Mutation {
    #[serde(rename = "InsertionM")]
    Insertion(Insertion),
    #[serde(rename = "DeletionM")]
    Deletion(Deletion),
    #[serde(rename = "ReplacementM")]
    Replacement(Replacement),
    #[serde(rename = "MovementM")]
    Movement(Movement),
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Insertion(_) => MutationKind::Insertion,
            Mutation::Deletion(_) => MutationKind::Deletion,
            Mutation::Replacement(_) => MutationKind::Replacement,
            Mutation::Movement(_) => MutationKind::Movement,
        }
    }

    /// The path this edit is anchored at: the owner of the target list for
    /// insertions, the source for movements, the target otherwise.
    pub fn target_node_path(&self) -> NodePath {
        match self {
            Mutation::Insertion(m) => m.target_node_path(),
            Mutation::Deletion(m) => m.target().clone(),
            Mutation::Replacement(m) => m.target().clone(),
            Mutation::Movement(m) => m.from().clone(),
        }
    }

    pub fn apply(&self, ast: &Ast) -> Result<Ast, MutationError> {
        match self {
            Mutation::Insertion(m) => m.apply(ast),
            Mutation::Deletion(m) => m.apply(ast),
            Mutation::Replacement(m) => m.apply(ast),
            Mutation::Movement(m) => m.apply(ast),
        }
    }

    pub fn forward_map(&self, path: &NodePath) -> Option<NodePath> {
        match self {
            Mutation::Insertion(m) => m.forward_map(path),
            Mutation::Deletion(m) => m.forward_map(path),
            Mutation::Replacement(m) => m.forward_map(path),
            Mutation::Movement(m) => m.forward_map(path),
        }
    }

    pub fn reverse_map(&self, path: &NodePath) -> Option<NodePath> {
        match self {
            Mutation::Insertion(m) => m.reverse_map(path),
            Mutation::Deletion(m) => m.reverse_map(path),
            Mutation::Replacement(m) => m.reverse_map(path),
            Mutation::Movement(m) => m.reverse_map(path),
        }
    }

    /// Paths in the resulting tree whose values this edit created.
    pub fn modified_node_paths(&self) -> Vec<NodePath> {
        match self {
            Mutation::Insertion(m) => vec![m.slot()],
            Mutation::Deletion(_) => Vec::new(),
            Mutation::Replacement(m) => vec![m.target().clone()],
            Mutation::Movement(m) => vec![m.insertion().slot()],
        }
    }

    pub fn modified_locations(&self, ast: &Ast, locs: &LocMap) -> ModifiedLocations {
        match self {
            Mutation::Insertion(m) => m.modified_locations(ast, locs),
            Mutation::Deletion(m) => m.modified_locations(ast, locs),
            Mutation::Replacement(m) => m.modified_locations(ast, locs),
            Mutation::Movement(m) => m.modified_locations(ast, locs),
        }
    }

    /// Re-express this edit, written after `from_prefix`, as an edit after
    /// `to_prefix`. `to_tree` is the tree `to_prefix` produces.
    pub fn rebase(
        &self,
        from_prefix: &MutationSequence,
        to_prefix: &MutationSequence,
        to_tree: &Ast,
    ) -> Option<Mutation> {
        let rebase = |path: &NodePath| MutationSequence::rebase_path(path, from_prefix, to_prefix);
        match self {
            Mutation::Deletion(m) => Deletion::new(rebase(m.target())?).ok().map(Mutation::from),
            Mutation::Replacement(m) => {
                Some(Replacement::new(rebase(m.target())?, m.node().clone()).into())
            }
            Mutation::Insertion(m) => {
                let (property, index) = rebase(&m.slot())?.split_last_index()?;
                Some(Insertion::new(property, index, m.node().clone()).into())
            }
            Mutation::Movement(m) => m.rebase(from_prefix, to_prefix, to_tree).map(Mutation::from),
        }
    }
}

impl From<Insertion> for Mutation {
    fn from(m: Insertion) -> Self {
        Mutation::Insertion(m)
    }
}

impl From<Deletion> for Mutation {
    fn from(m: Deletion) -> Self {
        Mutation::Deletion(m)
    }
}

impl From<Replacement> for Mutation {
    fn from(m: Replacement) -> Self {
        Mutation::Replacement(m)
    }
}

impl From<Movement> for Mutation {
    fn from(m: Movement) -> Self {
        Mutation::Movement(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use solmut_ast::LineColumn;

    #[test]
    fn kind_names() {
        assert_eq!(MutationKind::Deletion.to_string(), "DeletionM");
        assert_eq!("DeletionM".parse::<MutationKind>(), Ok(MutationKind::Deletion));
        assert_eq!("movement".parse::<MutationKind>(), Ok(MutationKind::Movement));
        assert_eq!(" Insertion ".parse::<MutationKind>(), Ok(MutationKind::Insertion));
        assert!("swap".parse::<MutationKind>().is_err());
        assert_eq!(
            serde_json::to_string(&MutationKind::Replacement).unwrap(),
            "\"ReplacementM\""
        );
    }

    #[test]
    fn wire_format_is_tagged() {
        let m: Mutation = Deletion::new(statement_path(0, 1)).unwrap().into();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mutationType": "DeletionM",
                "targetNodePath": ["children", "0", "subNodes", "0", "body", "statements", "1"]
            })
        );
        let back: Mutation = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);

        let m: Mutation = Insertion::new(statements_path(0), 0, stmt("z")).into();
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["mutationType"], "InsertionM");
        assert_eq!(json["insertIndex"], 0);
        assert_eq!(json["newNode"]["type"], "ExpressionStatement");
        assert_eq!(serde_json::from_value::<Mutation>(json).unwrap(), m);
    }

    #[test]
    fn deletion_of_a_field_is_rejected_on_read() {
        let json = serde_json::json!({"mutationType": "DeletionM", "targetNodePath": ["body"]});
        assert!(serde_json::from_value::<Mutation>(json).is_err());
    }

    #[test]
    fn target_paths() {
        let ins: Mutation = Insertion::new(statements_path(0), 2, stmt("z")).into();
        assert_eq!(ins.target_node_path(), path("children.0.subNodes.0.body"));

        let rep: Mutation = Replacement::new(statement_path(0, 1), stmt("z")).into();
        assert_eq!(rep.target_node_path(), statement_path(0, 1));
        assert_eq!(rep.modified_node_paths(), vec![statement_path(0, 1)]);
    }

    #[test]
    fn modified_locations_union_and_wire_form() {
        let a = CodeRange::new(LineColumn::new(1, 0), LineColumn::new(1, 5));
        let b = CodeRange::new(LineColumn::new(2, 0), LineColumn::new(2, 5));
        let known = ModifiedLocations::Known(vec![a]).union(ModifiedLocations::Known(vec![a, b]));
        assert_eq!(known, ModifiedLocations::Known(vec![a, b]));
        assert_eq!(
            ModifiedLocations::Known(vec![a]).union(ModifiedLocations::Unknown),
            ModifiedLocations::Unknown
        );

        assert_eq!(serde_json::to_string(&ModifiedLocations::Unknown).unwrap(), "\"unknown\"");
        let back: ModifiedLocations = serde_json::from_str(&serde_json::to_string(&known).unwrap()).unwrap();
        assert_eq!(back, known);
    }

    #[test]
    fn anchor_falls_back_to_recorded_locations() {
        let span = CodeRange::new(LineColumn::new(3, 1), LineColumn::new(3, 9));
        let mut locs = LocMap::new();
        locs.insert(path("a"), vec![span]);

        let with_loc = stmt("x").with_loc(span);
        assert_eq!(
            anchor_locations(Some(&with_loc), &path("b"), &LocMap::new()),
            ModifiedLocations::Known(vec![span])
        );
        assert_eq!(
            anchor_locations(Some(&stmt("x")), &path("a"), &locs),
            ModifiedLocations::Known(vec![span])
        );
        assert_eq!(anchor_locations(None, &path("b"), &locs), ModifiedLocations::Unknown);
    }
}
