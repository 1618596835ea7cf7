use crate::types::Segment;
use crate::PathError;

/// Check if a string represents a valid non-negative integer index.
///
/// Leading zeros are rejected so that `"01"` stays a key.
pub fn is_valid_index(index: &str) -> bool {
    if index.is_empty() {
        return false;
    }
    let bytes = index.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        return false;
    }
    bytes.iter().all(|&b| b.is_ascii_digit())
}

/// Check if a string consists only of ASCII digits.
pub fn is_integer(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an optional signed slice bound; the empty string means "absent".
pub(crate) fn parse_bound(s: &str) -> Option<Option<isize>> {
    let s = s.trim();
    if s.is_empty() {
        return Some(None);
    }
    s.parse::<isize>().ok().map(Some)
}

/// Get the parent path of a given path.
pub fn parent(path: &[Segment]) -> Result<Vec<Segment>, PathError> {
    if path.is_empty() {
        return Err(PathError::NoParent);
    }
    Ok(path[..path.len() - 1].to_vec())
}

/// Check if `parent` path is a strict prefix of the `child` path.
pub fn is_child(parent: &[Segment], child: &[Segment]) -> bool {
    parent.len() < child.len() && child[..parent.len()] == *parent
}
