//! Source locations attached to parsed nodes.

use serde::{Deserialize, Serialize};

/// A line/column position. Ordering is by line, then column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineColumn {
    pub line: u32,
    pub column: u32,
}

impl LineColumn {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// An inclusive source span.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeRange {
    pub start: LineColumn,
    pub end: LineColumn,
}

impl CodeRange {
    pub fn new(start: LineColumn, end: LineColumn) -> Self {
        Self { start, end }
    }

    /// True if the two spans share at least one position.
    pub fn intersects(&self, other: &CodeRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// True if this span lies entirely inside `outer`.
    pub fn is_within(&self, outer: &CodeRange) -> bool {
        outer.start <= self.start && self.end <= outer.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(l1: u32, c1: u32, l2: u32, c2: u32) -> CodeRange {
        CodeRange::new(LineColumn::new(l1, c1), LineColumn::new(l2, c2))
    }

    #[test]
    fn intersection_is_symmetric() {
        let a = range(1, 0, 3, 10);
        let b = range(3, 5, 6, 0);
        let c = range(4, 0, 5, 0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(b.intersects(&c));
    }

    #[test]
    fn containment_compares_columns_on_shared_lines() {
        let outer = range(2, 4, 8, 0);
        assert!(range(2, 4, 8, 0).is_within(&outer));
        assert!(range(3, 0, 7, 99).is_within(&outer));
        assert!(!range(2, 3, 4, 0).is_within(&outer));
        assert!(!range(5, 0, 8, 1).is_within(&outer));
    }

    #[test]
    fn json_shape() {
        let r = range(1, 2, 3, 4);
        let json = serde_json::to_value(r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start": {"line": 1, "column": 2}, "end": {"line": 3, "column": 4}})
        );
    }
}
