//! Paths addressing values inside a tree.
//!
//! A path is a sequence of field names and list indices starting at the
//! root. On the wire every segment is a string, indices in decimal form, so
//! `["children", "1", "subNodes", "0"]` addresses the first sub-node of the
//! second child.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One step of a [`NodePath`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    /// A named field of a node.
    Field(String),
    /// A position in a list.
    Index(usize),
}

impl PathSegment {
    /// Read a segment from its wire form. Digit-only text is an index.
    pub fn parse(text: &str) -> Self {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = text.parse() {
                return PathSegment::Index(index);
            }
        }
        PathSegment::Field(text.to_string())
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Index(i) => Some(*i),
            PathSegment::Field(_) => None,
        }
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            PathSegment::Field(name) => Some(name),
            PathSegment::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Field(name) => f.write_str(name),
            PathSegment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(text: &str) -> Self {
        PathSegment::Field(text.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SegmentVisitor;

        impl<'de> Visitor<'de> for SegmentVisitor {
            type Value = PathSegment;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a field name or a list index")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PathSegment, E> {
                Ok(PathSegment::parse(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PathSegment, E> {
                usize::try_from(v)
                    .map(PathSegment::Index)
                    .map_err(|_| E::custom("index does not fit in usize"))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PathSegment, E> {
                usize::try_from(v)
                    .map(PathSegment::Index)
                    .map_err(|_| E::custom("negative list index"))
            }
        }

        deserializer.deserialize_any(SegmentVisitor)
    }
}

/// A path from the root of a tree to one of its values.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    /// The empty path, addressing the root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segment(&self, position: usize) -> Option<&PathSegment> {
        self.0.get(position)
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    /// Index carried by the last segment, if it is an index.
    pub fn last_index(&self) -> Option<usize> {
        self.0.last().and_then(PathSegment::as_index)
    }

    /// True if `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True if `prefix` is a strict prefix of this path.
    pub fn is_strictly_inside(&self, prefix: &NodePath) -> bool {
        self.0.len() > prefix.0.len() && self.starts_with(prefix)
    }

    /// The path without its last segment. The root has no parent.
    pub fn parent(&self) -> Option<NodePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Split `[prefix..., index]` into the list path and the index.
    pub fn split_last_index(&self) -> Option<(NodePath, usize)> {
        let index = self.last_index()?;
        Some((Self(self.0[..self.0.len() - 1].to_vec()), index))
    }

    /// The first `len` segments.
    pub fn prefix(&self, len: usize) -> NodePath {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    pub fn child(&self, segment: impl Into<PathSegment>) -> NodePath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn child_field(&self, name: &str) -> NodePath {
        self.child(PathSegment::Field(name.to_string()))
    }

    pub fn child_index(&self, index: usize) -> NodePath {
        self.child(PathSegment::Index(index))
    }

    /// Copy of this path with the segment at `position` replaced by `index`.
    pub fn with_index_at(&self, position: usize, index: usize) -> NodePath {
        let mut segments = self.0.clone();
        if let Some(segment) = segments.get_mut(position) {
            *segment = PathSegment::Index(index);
        }
        Self(segments)
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// True if any segment names one of the given fields.
    pub fn mentions_any(&self, fields: &[&str]) -> bool {
        self.0
            .iter()
            .any(|s| matches!(s, PathSegment::Field(name) if fields.contains(&name.as_str())))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathSegment> {
        self.0.iter()
    }
}

impl From<Vec<PathSegment>> for NodePath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

impl<'a> IntoIterator for &'a NodePath {
    type Item = &'a PathSegment;
    type IntoIter = std::slice::Iter<'a, PathSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Dotted form, e.g. `children.1.subNodes`. The empty string is the root.
impl FromStr for NodePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s == "<root>" {
            return Ok(Self::root());
        }
        Ok(Self(s.split('.').map(PathSegment::parse).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    #[test]
    fn digit_segments_become_indices() {
        let p = path("children.1.subNodes.0");
        assert_eq!(
            p.segments(),
            &[
                PathSegment::Field("children".into()),
                PathSegment::Index(1),
                PathSegment::Field("subNodes".into()),
                PathSegment::Index(0),
            ]
        );
        assert_eq!(PathSegment::parse(""), PathSegment::Field(String::new()));
        assert_eq!(PathSegment::parse("1a"), PathSegment::Field("1a".into()));
    }

    #[test]
    fn wire_form_uses_strings() {
        let p = path("children.1");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, r#"["children","1"]"#);

        let back: NodePath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);

        let numeric: NodePath = serde_json::from_str(r#"["children",1]"#).unwrap();
        assert_eq!(numeric, p);
    }

    #[test]
    fn prefix_relations() {
        let p = path("body.2.expression");
        assert!(p.starts_with(&path("body.2")));
        assert!(p.starts_with(&p));
        assert!(!p.is_strictly_inside(&p));
        assert!(p.is_strictly_inside(&NodePath::root()));
        assert!(!p.starts_with(&path("body.1")));
    }

    #[test]
    fn parent_and_split() {
        let p = path("body.2");
        assert_eq!(p.parent(), Some(path("body")));
        assert_eq!(p.split_last_index(), Some((path("body"), 2)));
        assert_eq!(path("body").split_last_index(), None);
        assert_eq!(NodePath::root().parent(), None);
    }

    #[test]
    fn index_rewrite() {
        let p = path("body.2.expression");
        assert_eq!(p.with_index_at(1, 5), path("body.5.expression"));
        assert_eq!(p.child_index(3), path("body.2.expression.3"));
    }

    #[test]
    fn display_forms() {
        assert_eq!(NodePath::root().to_string(), "<root>");
        assert_eq!(path("a.0").to_string(), "a.0");
        assert!(path("a.loc").mentions_any(&["loc", "range"]));
    }
}
