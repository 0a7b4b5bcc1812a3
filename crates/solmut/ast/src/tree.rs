//! Tree values, nodes and whole trees.

use crate::error::AstError;
use crate::location::CodeRange;
use crate::path::{NodePath, PathSegment};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fields that parsers attach for tooling and that never take part in
/// canonical comparison.
pub const EXTRA_FIELDS: &[&str] = &["tokens", "comments"];

const LOCATION_KEYS: &[&str] = &["loc", "range"];

fn is_canonical_skip(key: &str) -> bool {
    EXTRA_FIELDS.contains(&key) || LOCATION_KEYS.contains(&key)
}

/// A value in a tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Node(Arc<Node>),
    List(Vec<Value>),
    /// A JSON object without a `type` tag.
    Object(BTreeMap<String, Value>),
}

/// A typed tree node.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    ty: String,
    fields: BTreeMap<String, Value>,
    loc: Option<CodeRange>,
    range: Option<(usize, usize)>,
}

impl Value {
    pub fn node(node: Node) -> Self {
        Value::Node(Arc::new(node))
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The child reached by one path segment.
    pub fn get(&self, segment: &PathSegment) -> Option<&Value> {
        match (self, segment) {
            (Value::Node(node), PathSegment::Field(name)) => node.fields.get(name),
            (Value::Object(map), PathSegment::Field(name)) => map.get(name),
            (Value::List(items), PathSegment::Index(i)) => items.get(*i),
            _ => None,
        }
    }

    /// Mutable access to a child. Shared nodes on the way are copied first.
    pub fn get_mut(&mut self, segment: &PathSegment) -> Option<&mut Value> {
        match (self, segment) {
            (Value::Node(node), PathSegment::Field(name)) => {
                Arc::make_mut(node).fields.get_mut(name)
            }
            (Value::Object(map), PathSegment::Field(name)) => map.get_mut(name),
            (Value::List(items), PathSegment::Index(i)) => items.get_mut(*i),
            _ => None,
        }
    }

    /// Read a value from its JSON form. Objects with a string `type` become nodes.
    pub fn from_json(json: Json) -> Result<Self, AstError> {
        Ok(match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(Value::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Json::Object(map) => {
                if matches!(map.get("type"), Some(Json::String(_))) {
                    Value::node(Node::from_json_map(map)?)
                } else {
                    Value::Object(
                        map.into_iter()
                            .map(|(k, v)| Ok((k, Value::from_json(v)?)))
                            .collect::<Result<_, AstError>>()?,
                    )
                }
            }
        })
    }

    pub fn to_json(&self) -> Json {
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::Node(node) => node.to_json(),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// JSON form without location metadata or extra fields. Keys are sorted.
    pub fn canonical_json(&self) -> Json {
        match self {
            Value::Node(node) => node.canonical_json(),
            Value::List(items) => Json::Array(items.iter().map(Value::canonical_json).collect()),
            Value::Object(map) => Json::Object(
                map.iter()
                    .filter(|(k, _)| !is_canonical_skip(k))
                    .map(|(k, v)| (k.clone(), v.canonical_json()))
                    .collect(),
            ),
            other => other.to_json(),
        }
    }

    /// Structural equality ignoring location metadata and extra fields.
    pub fn canonical_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Node(a), Value::Node(b)) => Arc::ptr_eq(a, b) || a.canonical_eq(b),
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.canonical_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => fields_canonical_eq(a, b),
            _ => self == other,
        }
    }

    /// Copy without the named fields anywhere in the subtree. Returns `None`
    /// when nothing was removed, so callers can keep sharing the original.
    fn without_fields(&self, names: &[&str]) -> Option<Value> {
        match self {
            Value::Node(node) => node.without_fields(names).map(Value::node),
            Value::List(items) => {
                let changed: Vec<Option<Value>> =
                    items.iter().map(|v| v.without_fields(names)).collect();
                if changed.iter().all(Option::is_none) {
                    return None;
                }
                Some(Value::List(
                    changed
                        .into_iter()
                        .zip(items)
                        .map(|(new, old)| new.unwrap_or_else(|| old.clone()))
                        .collect(),
                ))
            }
            Value::Object(map) => {
                let mut removed = false;
                let mut out = BTreeMap::new();
                for (k, v) in map {
                    if names.contains(&k.as_str()) {
                        removed = true;
                        continue;
                    }
                    match v.without_fields(names) {
                        Some(new) => {
                            removed = true;
                            out.insert(k.clone(), new);
                        }
                        None => {
                            out.insert(k.clone(), v.clone());
                        }
                    }
                }
                removed.then_some(Value::Object(out))
            }
            _ => None,
        }
    }

    fn without_location(&self) -> Value {
        match self {
            Value::Node(node) => Value::node(node.without_location()),
            Value::List(items) => Value::List(items.iter().map(Value::without_location).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.without_location()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

fn fields_canonical_eq(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> bool {
    let mut left = a.iter().filter(|(k, _)| !is_canonical_skip(k));
    let mut right = b.iter().filter(|(k, _)| !is_canonical_skip(k));
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some((ka, va)), Some((kb, vb))) => {
                if ka != kb || !va.canonical_eq(vb) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::node(node)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Value::from_json(json).map_err(D::Error::custom)
    }
}

impl Node {
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            fields: BTreeMap::new(),
            loc: None,
            range: None,
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_loc(mut self, loc: CodeRange) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn ty(&self) -> &str {
        &self.ty
    }

    pub fn is(&self, ty: &str) -> bool {
        self.ty == ty
    }

    pub fn loc(&self) -> Option<&CodeRange> {
        self.loc.as_ref()
    }

    pub fn range(&self) -> Option<(usize, usize)> {
        self.range
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    pub fn node_field(&self, name: &str) -> Option<&Node> {
        self.field(name).and_then(Value::as_node)
    }

    pub fn list_field(&self, name: &str) -> Option<&[Value]> {
        self.field(name).and_then(Value::as_list)
    }

    /// Deep copy with `loc` and `range` removed everywhere.
    pub fn without_location(&self) -> Node {
        Node {
            ty: self.ty.clone(),
            fields: self
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.without_location()))
                .collect(),
            loc: None,
            range: None,
        }
    }

    fn without_fields(&self, names: &[&str]) -> Option<Node> {
        let mut changed = false;
        let mut fields = BTreeMap::new();
        for (k, v) in &self.fields {
            if names.contains(&k.as_str()) {
                changed = true;
                continue;
            }
            match v.without_fields(names) {
                Some(new) => {
                    changed = true;
                    fields.insert(k.clone(), new);
                }
                None => {
                    fields.insert(k.clone(), v.clone());
                }
            }
        }
        changed.then(|| Node {
            ty: self.ty.clone(),
            fields,
            loc: self.loc,
            range: self.range,
        })
    }

    pub fn canonical_eq(&self, other: &Node) -> bool {
        self.ty == other.ty && fields_canonical_eq(&self.fields, &other.fields)
    }

    /// Compact canonical JSON text, usable as a dedup key.
    pub fn canonical_key(&self) -> String {
        self.canonical_json().to_string()
    }

    fn from_json_map(mut map: serde_json::Map<String, Json>) -> Result<Self, AstError> {
        let ty = match map.remove("type") {
            Some(Json::String(ty)) => ty,
            _ => return Err(AstError::Json("node object without a type tag".into())),
        };
        let loc = match map.remove("loc") {
            None | Some(Json::Null) => None,
            Some(v) => Some(serde_json::from_value(v)?),
        };
        let range = match map.remove("range") {
            None | Some(Json::Null) => None,
            Some(v) => Some(serde_json::from_value(v)?),
        };
        let fields = map
            .into_iter()
            .map(|(k, v)| Ok((k, Value::from_json(v)?)))
            .collect::<Result<_, AstError>>()?;
        Ok(Self {
            ty,
            fields,
            loc,
            range,
        })
    }

    pub fn to_json(&self) -> Json {
        let mut map = serde_json::Map::new();
        map.insert("type".into(), Json::String(self.ty.clone()));
        if let Some(loc) = &self.loc {
            if let Ok(v) = serde_json::to_value(loc) {
                map.insert("loc".into(), v);
            }
        }
        if let Some((start, end)) = self.range {
            map.insert("range".into(), Json::Array(vec![start.into(), end.into()]));
        }
        for (k, v) in &self.fields {
            map.insert(k.clone(), v.to_json());
        }
        Json::Object(map)
    }

    pub fn canonical_json(&self) -> Json {
        let mut map = serde_json::Map::new();
        map.insert("type".into(), Json::String(self.ty.clone()));
        for (k, v) in &self.fields {
            if !is_canonical_skip(k) {
                map.insert(k.clone(), v.canonical_json());
            }
        }
        Json::Object(map)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Node(node) => Ok(Arc::try_unwrap(node).unwrap_or_else(|n| (*n).clone())),
            _ => Err(D::Error::custom("expected an object with a type tag")),
        }
    }
}

/// A whole tree. Cloning is cheap: the root is shared.
#[derive(Clone, Debug, PartialEq)]
pub struct Ast {
    root: Value,
}

impl Ast {
    pub fn new(root: Node) -> Self {
        Self {
            root: Value::node(root),
        }
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn from_json_str(text: &str) -> Result<Self, AstError> {
        let json: Json = serde_json::from_str(text)?;
        Ok(Self {
            root: Value::from_json(json)?,
        })
    }

    pub fn to_json_string(&self) -> String {
        self.root.to_json().to_string()
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn get(&self, path: &NodePath) -> Option<&Value> {
        path.iter().try_fold(&self.root, |value, segment| value.get(segment))
    }

    pub fn node_at(&self, path: &NodePath) -> Option<&Node> {
        self.get(path).and_then(Value::as_node)
    }

    /// Mutable access; every node on the way is unshared first.
    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Value> {
        let mut current = &mut self.root;
        for segment in path {
            current = current.get_mut(segment)?;
        }
        Some(current)
    }

    /// Nodes met when walking from the root down to `path`, inclusive, with
    /// the depth at which each was found.
    pub fn nodes_along(&self, path: &NodePath) -> Vec<(usize, &Node)> {
        let mut out = Vec::new();
        let mut current = &self.root;
        if let Value::Node(node) = current {
            out.push((0, node.as_ref()));
        }
        for (depth, segment) in path.iter().enumerate() {
            match current.get(segment) {
                Some(next) => current = next,
                None => break,
            }
            if let Value::Node(node) = current {
                out.push((depth + 1, node.as_ref()));
            }
        }
        out
    }

    /// Path of the closest strict ancestor of `path` that is a node.
    pub fn nearest_node_ancestor(&self, path: &NodePath) -> Option<NodePath> {
        (0..path.len())
            .rev()
            .map(|len| path.prefix(len))
            .find(|prefix| self.node_at(prefix).is_some())
    }

    /// Replace the value at `path`, returning the previous one.
    pub fn replace(&mut self, path: &NodePath, value: Value) -> Result<Value, AstError> {
        let slot = self
            .get_mut(path)
            .ok_or_else(|| AstError::PathNotFound(path.clone()))?;
        Ok(std::mem::replace(slot, value))
    }

    /// Insert `value` into the list at `list_path` before position `index`.
    pub fn insert(&mut self, list_path: &NodePath, index: usize, value: Value) -> Result<(), AstError> {
        let slot = self
            .get_mut(list_path)
            .ok_or_else(|| AstError::PathNotFound(list_path.clone()))?;
        match slot {
            Value::List(items) if index <= items.len() => {
                items.insert(index, value);
                Ok(())
            }
            Value::List(items) => Err(AstError::IndexOutOfRange {
                path: list_path.clone(),
                index,
                len: items.len(),
            }),
            _ => Err(AstError::NotAList(list_path.clone())),
        }
    }

    /// Remove the list element addressed by `path`, returning it.
    pub fn remove(&mut self, path: &NodePath) -> Result<Value, AstError> {
        let (list_path, index) = path
            .split_last_index()
            .ok_or_else(|| AstError::NotAList(path.parent().unwrap_or_default()))?;
        let slot = self
            .get_mut(&list_path)
            .ok_or_else(|| AstError::PathNotFound(list_path.clone()))?;
        match slot {
            Value::List(items) if index < items.len() => Ok(items.remove(index)),
            Value::List(items) => Err(AstError::IndexOutOfRange {
                path: list_path,
                index,
                len: items.len(),
            }),
            _ => Err(AstError::NotAList(list_path)),
        }
    }

    /// Copy with the named fields removed everywhere. Untouched subtrees stay shared.
    pub fn without_fields(&self, names: &[&str]) -> Ast {
        match self.root.without_fields(names) {
            Some(root) => Ast { root },
            None => self.clone(),
        }
    }

    /// Copy with `tokens` and `comments` removed.
    pub fn without_extras(&self) -> Ast {
        self.without_fields(EXTRA_FIELDS)
    }

    pub fn without_location(&self) -> Ast {
        Ast {
            root: self.root.without_location(),
        }
    }

    pub fn canonical_eq(&self, other: &Ast) -> bool {
        self.root.canonical_eq(&other.root)
    }

    /// Compact canonical JSON text of the whole tree.
    pub fn canonical_key(&self) -> String {
        self.root.canonical_json().to_string()
    }
}

impl Serialize for Ast {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ast {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Ast {
            root: Value::deserialize(deserializer)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Ast {
        Ast::from_json_str(
            &json!({
                "type": "SourceUnit",
                "loc": {"start": {"line": 1, "column": 0}, "end": {"line": 9, "column": 1}},
                "range": [0, 120],
                "tokens": [{"type": "Keyword", "value": "contract"}],
                "children": [
                    {"type": "PragmaDirective", "name": "solidity", "value": "^0.4.24"},
                    {
                        "type": "ContractDefinition",
                        "name": "Bank",
                        "subNodes": []
                    }
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn path(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    #[test]
    fn json_reading_splits_location() {
        let ast = sample();
        let root = ast.root().as_node().unwrap();
        assert_eq!(root.ty(), "SourceUnit");
        assert_eq!(root.loc().unwrap().end.line, 9);
        assert_eq!(root.range(), Some((0, 120)));
        assert!(root.field("loc").is_none());
        assert!(root.field("tokens").is_some());
        assert_eq!(
            ast.node_at(&path("children.1")).unwrap().str_field("name"),
            Some("Bank")
        );
    }

    #[test]
    fn json_writing_restores_keys() {
        let ast = sample();
        let back = Ast::from_json_str(&ast.to_json_string()).unwrap();
        assert_eq!(back, ast);
        let json: Json = serde_json::from_str(&ast.to_json_string()).unwrap();
        assert_eq!(json["range"], json!([0, 120]));
        assert_eq!(json["children"][0]["value"], json!("^0.4.24"));
    }

    #[test]
    fn canonical_form_ignores_location_and_extras() {
        let ast = sample();
        let stripped = ast.without_extras().without_location();
        assert_ne!(ast, stripped);
        assert!(ast.canonical_eq(&stripped));
        assert_eq!(ast.canonical_key(), stripped.canonical_key());
        assert!(!ast.canonical_key().contains("tokens"));
        assert!(!ast.canonical_key().contains("\"loc\""));
    }

    #[test]
    fn untyped_objects_are_kept() {
        let value = Value::from_json(json!({"a": 1, "b": [true, null]})).unwrap();
        assert!(matches!(value, Value::Object(_)));
        assert_eq!(value.to_json(), json!({"a": 1, "b": [true, null]}));
    }

    #[test]
    fn edits_leave_the_old_tree_intact() {
        let ast = sample();
        let mut edited = ast.clone();
        edited
            .insert(&path("children.1.subNodes"), 0, Node::new("EventDefinition").into())
            .unwrap();

        assert_eq!(ast.get(&path("children.1.subNodes")).unwrap().as_list().unwrap().len(), 0);
        assert_eq!(edited.get(&path("children.1.subNodes")).unwrap().as_list().unwrap().len(), 1);

        let (Some(Value::Node(a)), Some(Value::Node(b))) =
            (ast.get(&path("children.0")), edited.get(&path("children.0")))
        else {
            panic!("pragma node missing");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn remove_and_replace() {
        let mut ast = sample();
        let removed = ast.remove(&path("children.0")).unwrap();
        assert_eq!(removed.as_node().unwrap().ty(), "PragmaDirective");
        assert_eq!(ast.node_at(&path("children.0")).unwrap().ty(), "ContractDefinition");

        let old = ast
            .replace(&path("children.0.name"), Value::from("Vault"))
            .unwrap();
        assert_eq!(old, Value::from("Bank"));
        assert_eq!(
            ast.node_at(&path("children.0")).unwrap().str_field("name"),
            Some("Vault")
        );
    }

    #[test]
    fn edit_errors() {
        let mut ast = sample();
        assert_eq!(
            ast.remove(&path("children.5")),
            Err(AstError::IndexOutOfRange {
                path: path("children"),
                index: 5,
                len: 2
            })
        );
        assert_eq!(
            ast.insert(&path("children.0"), 0, Value::Null),
            Err(AstError::NotAList(path("children.0")))
        );
        assert_eq!(
            ast.replace(&path("missing"), Value::Null),
            Err(AstError::PathNotFound(path("missing")))
        );
        assert!(matches!(ast.remove(&path("children")), Err(AstError::NotAList(_))));
    }

    #[test]
    fn ancestors_along_a_path() {
        let ast = sample();
        let along = ast.nodes_along(&path("children.1.subNodes"));
        let types: Vec<_> = along.iter().map(|(_, n)| n.ty()).collect();
        assert_eq!(types, vec!["SourceUnit", "ContractDefinition"]);
        assert_eq!(
            ast.nearest_node_ancestor(&path("children.1.subNodes")),
            Some(path("children.1"))
        );
        assert_eq!(ast.nearest_node_ancestor(&NodePath::root()), None);
    }

    #[test]
    fn stripping_nothing_keeps_sharing() {
        let ast = Ast::new(Node::new("Block").with("statements", Vec::<Value>::new()));
        let same = ast.without_extras();
        match (ast.root(), same.root()) {
            (Value::Node(a), Value::Node(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("root is not a node"),
        }
    }
}
