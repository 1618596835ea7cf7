//! Type definitions for tree paths.

use std::fmt;
use std::ops::Deref;

/// A step in a tree path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Mapping key. A leading `@` marks an attribute predicate for backends
    /// whose nodes carry attributes.
    Key(String),
    /// Position in a sequence.
    Index(usize),
    /// Python-style slice, negative bounds count from the end.
    Slice {
        start: Option<isize>,
        stop: Option<isize>,
        step: Option<isize>,
    },
    /// Append marker: the slot after the last element.
    Next,
    /// The final element.
    Last,
    /// Every child at this level. Read only.
    Wildcard,
}

impl Segment {
    /// A slice selecting exactly the element at position `index`.
    ///
    /// Backends use it to address repeated children by document order only.
    pub fn position(index: usize) -> Self {
        Segment::Slice {
            start: Some(index as isize),
            stop: Some(index as isize + 1),
            step: None,
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Segment::Key(key.into())
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Whether the segment addresses a mapping (key) rather than a sequence.
    pub fn is_key(&self) -> bool {
        matches!(self, Segment::Key(_))
    }

    /// Whether the segment is an attribute predicate (`@name` or `@name=value`).
    pub fn is_attribute(&self) -> bool {
        matches!(self, Segment::Key(k) if k.starts_with('@'))
    }

    /// Wildcards and slices stand for several concrete segments.
    pub fn is_pattern(&self) -> bool {
        matches!(self, Segment::Wildcard | Segment::Slice { .. })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format_segment(self))
    }
}

impl From<&str> for Segment {
    fn from(s: &str) -> Self {
        crate::parse_segment(s)
    }
}

impl From<String> for Segment {
    fn from(s: String) -> Self {
        crate::parse_segment(&s)
    }
}

impl From<usize> for Segment {
    fn from(i: usize) -> Self {
        Segment::Index(i)
    }
}

/// Indices selected by a slice over a sequence of `len` elements.
///
/// Follows Python semantics; a zero step selects nothing.
pub fn slice_indices(
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
    len: usize,
) -> Vec<usize> {
    let step = step.unwrap_or(1);
    let len = len as isize;
    let mut out = Vec::new();
    if step == 0 || len == 0 {
        return out;
    }
    let normalize = |v: isize, lo: isize, hi: isize| {
        let v = if v < 0 { v + len } else { v };
        v.clamp(lo, hi)
    };
    if step > 0 {
        let mut i = start.map(|v| normalize(v, 0, len)).unwrap_or(0);
        let end = stop.map(|v| normalize(v, 0, len)).unwrap_or(len);
        while i < end {
            out.push(i as usize);
            i += step;
        }
    } else {
        let mut i = start.map(|v| normalize(v, -1, len - 1)).unwrap_or(len - 1);
        let end = stop.map(|v| normalize(v, -1, len - 1)).unwrap_or(-1);
        while i > end {
            out.push(i as usize);
            i += step;
        }
    }
    out
}

/// A path into a tree: an ordered list of segments.
///
/// The empty path addresses the node itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.0.push(segment.into());
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Path {
        let mut out = self.clone();
        out.push(segment);
        out
    }

    /// Concatenation of `self` and `other`.
    pub fn join(&self, other: impl Into<Path>) -> Path {
        let other = other.into();
        let mut out = Vec::with_capacity(self.0.len() + other.0.len());
        out.extend_from_slice(&self.0);
        out.extend(other.0);
        Path(out)
    }

    /// The path without its last segment.
    pub fn parent(&self) -> Result<Path, crate::PathError> {
        crate::parent(&self.0).map(Path)
    }

    /// No wildcard or slice segments.
    pub fn is_concrete(&self) -> bool {
        !self.0.iter().any(Segment::is_pattern)
    }

    pub fn into_vec(self) -> Vec<Segment> {
        self.0
    }
}

impl Deref for Path {
    type Target = [Segment];

    fn deref(&self) -> &[Segment] {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::format_path(&self.0))
    }
}

impl From<Vec<Segment>> for Path {
    fn from(v: Vec<Segment>) -> Self {
        Path(v)
    }
}

impl From<&[Segment]> for Path {
    fn from(v: &[Segment]) -> Self {
        Path(v.to_vec())
    }
}

impl<const N: usize> From<[Segment; N]> for Path {
    fn from(v: [Segment; N]) -> Self {
        Path(v.into())
    }
}

impl From<Segment> for Path {
    fn from(s: Segment) -> Self {
        Path(vec![s])
    }
}

impl From<&Path> for Path {
    fn from(p: &Path) -> Self {
        p.clone()
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        crate::parse_path(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        crate::parse_path(&s)
    }
}

impl From<usize> for Path {
    fn from(i: usize) -> Self {
        Path(vec![Segment::Index(i)])
    }
}

impl From<Option<&str>> for Path {
    fn from(s: Option<&str>) -> Self {
        s.map(crate::parse_path).unwrap_or_default()
    }
}

impl FromIterator<Segment> for Path {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl IntoIterator for Path {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_indices_forward() {
        assert_eq!(slice_indices(None, None, None, 4), vec![0, 1, 2, 3]);
        assert_eq!(slice_indices(Some(1), Some(3), None, 4), vec![1, 2]);
        assert_eq!(slice_indices(Some(-2), None, None, 4), vec![2, 3]);
        assert_eq!(slice_indices(None, None, Some(2), 5), vec![0, 2, 4]);
        assert_eq!(slice_indices(Some(10), None, None, 4), Vec::<usize>::new());
    }

    #[test]
    fn test_slice_indices_backward() {
        assert_eq!(slice_indices(None, None, Some(-1), 3), vec![2, 1, 0]);
        assert_eq!(slice_indices(Some(2), Some(0), Some(-1), 3), vec![2, 1]);
    }

    #[test]
    fn test_slice_indices_zero_step() {
        assert!(slice_indices(None, None, Some(0), 3).is_empty());
    }

    #[test]
    fn test_position_selects_one() {
        if let Segment::Slice { start, stop, step } = Segment::position(2) {
            assert_eq!(slice_indices(start, stop, step, 5), vec![2]);
        } else {
            panic!("position must be a slice");
        }
    }

    #[test]
    fn test_path_join_and_parent() {
        let p = Path::from("a.b");
        let q = p.join(Path::from(vec![Segment::Index(0)]));
        assert_eq!(q.len(), 3);
        assert_eq!(q.parent().unwrap(), p);
        assert!(Path::new().parent().is_err());
    }

    #[test]
    fn test_is_concrete() {
        assert!(Path::from("a.0.b").is_concrete());
        assert!(!Path::from("a.*.b").is_concrete());
        assert!(!Path::from("a.1:3").is_concrete());
    }
}
