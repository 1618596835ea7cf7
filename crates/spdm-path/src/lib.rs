//! Tree paths for spdm.
//!
//! A path is an ordered list of [`Segment`]s: mapping keys, sequence indices,
//! slices, and the `Next` / `Last` / `Wildcard` markers. Paths are usually
//! written as dot-delimited strings.
//!
//! # Example
//!
//! ```
//! use spdm_path::{format_path, parse_path, Segment};
//!
//! let path = parse_path("equilibrium.time_slice.0.profiles_1d");
//! assert_eq!(path[2], Segment::Index(0));
//! assert_eq!(format_path(&path), "equilibrium.time_slice.0.profiles_1d");
//!
//! let markers = parse_path("a.-.-1.*");
//! assert_eq!(
//!     markers.segments(),
//!     &[Segment::key("a"), Segment::Next, Segment::Last, Segment::Wildcard]
//! );
//! ```

use serde_json::Value;
use thiserror::Error;

pub mod types;
pub use types::{slice_indices, Path, Segment};

pub mod validate;
pub use validate::{validate_path, validate_write_path, MAX_PATH_LENGTH};

pub mod traverser;
pub use traverser::{OnError, PathTraverser};

mod util;
pub use util::{is_child, is_integer, is_valid_index, parent};

/// Separator between segments in the string form.
pub const DELIMITER: char = '.';

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("NO_PARENT")]
    NoParent,
    #[error("Invalid index: {0}")]
    InvalidIndex(String),
    #[error("Path too long")]
    PathTooLong,
    #[error("Invalid path step: {0:?}")]
    InvalidPathStep(String),
    #[error("Path segment `{0}` is a pattern; a concrete path is required")]
    NotConcrete(String),
}

/// Decode one token of the string form.
///
/// | token            | segment    |
/// |------------------|------------|
/// | `12`             | `Index`    |
/// | `-`              | `Next`     |
/// | `-1`             | `Last`     |
/// | `*`              | `Wildcard` |
/// | `1:5`, `::2`     | `Slice`    |
/// | anything else    | `Key`      |
pub fn parse_segment(token: &str) -> Segment {
    match token {
        "*" => return Segment::Wildcard,
        "-" => return Segment::Next,
        "-1" => return Segment::Last,
        _ => {}
    }
    if is_valid_index(token) {
        if let Ok(i) = token.parse() {
            return Segment::Index(i);
        }
    }
    if token.contains(':') && !token.starts_with('@') {
        let parts: Vec<&str> = token.split(':').collect();
        if parts.len() <= 3 {
            let bounds: Option<Vec<Option<isize>>> =
                parts.iter().map(|p| util::parse_bound(p)).collect();
            if let Some(b) = bounds {
                return Segment::Slice {
                    start: b[0],
                    stop: b[1],
                    step: b.get(2).copied().flatten(),
                };
            }
        }
    }
    Segment::Key(token.to_string())
}

/// Parse the dot-delimited string form of a path.
///
/// The empty string is the root path.
pub fn parse_path(path: &str) -> Path {
    if path.is_empty() {
        return Path::new();
    }
    path.split(DELIMITER).map(parse_segment).collect()
}

/// Format one segment into its token.
pub fn format_segment(segment: &Segment) -> String {
    match segment {
        Segment::Key(k) => k.clone(),
        Segment::Index(i) => i.to_string(),
        Segment::Next => "-".to_string(),
        Segment::Last => "-1".to_string(),
        Segment::Wildcard => "*".to_string(),
        Segment::Slice { start, stop, step } => {
            let mut s = String::new();
            if let Some(v) = start {
                s.push_str(&v.to_string());
            }
            s.push(':');
            if let Some(v) = stop {
                s.push_str(&v.to_string());
            }
            if let Some(v) = step {
                s.push(':');
                s.push_str(&v.to_string());
            }
            s
        }
    }
}

/// Format path segments into the dot-delimited string form.
pub fn format_path(path: &[Segment]) -> String {
    path.iter()
        .map(format_segment)
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

/// Convert a JSON description of a path.
///
/// - `null` → root
/// - string → parsed with [`parse_path`]
/// - non-negative integer → single index
/// - array → one segment per element; strings are decoded with
///   [`parse_segment`] and never split
pub fn path_from_value(value: &Value) -> Result<Path, PathError> {
    match value {
        Value::Null => Ok(Path::new()),
        Value::String(s) => Ok(parse_path(s)),
        Value::Number(_) => segment_from_value(value).map(Path::from),
        Value::Array(items) => items.iter().map(segment_from_value).collect(),
        other => Err(PathError::InvalidPathStep(other.to_string())),
    }
}

fn segment_from_value(value: &Value) -> Result<Segment, PathError> {
    match value {
        Value::String(s) => Ok(parse_segment(s)),
        Value::Number(n) => match n.as_i64() {
            Some(-1) => Ok(Segment::Last),
            Some(i) if i >= 0 => Ok(Segment::Index(i as usize)),
            _ => Err(PathError::InvalidIndex(n.to_string())),
        },
        other => Err(PathError::InvalidPathStep(other.to_string())),
    }
}

/// Render a path as JSON, the inverse of [`path_from_value`] for arrays.
pub fn path_to_value(path: &[Segment]) -> Value {
    Value::Array(
        path.iter()
            .map(|s| match s {
                Segment::Index(i) => Value::from(*i),
                other => Value::String(format_segment(other)),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_segment_tokens() {
        assert_eq!(parse_segment("foo"), Segment::key("foo"));
        assert_eq!(parse_segment("3"), Segment::Index(3));
        assert_eq!(parse_segment("03"), Segment::key("03"));
        assert_eq!(parse_segment("-"), Segment::Next);
        assert_eq!(parse_segment("-1"), Segment::Last);
        assert_eq!(parse_segment("*"), Segment::Wildcard);
        assert_eq!(
            parse_segment("1:4:2"),
            Segment::Slice {
                start: Some(1),
                stop: Some(4),
                step: Some(2)
            }
        );
        assert_eq!(
            parse_segment(":"),
            Segment::Slice {
                start: None,
                stop: None,
                step: None
            }
        );
        assert_eq!(parse_segment("a:b"), Segment::key("a:b"));
        assert_eq!(parse_segment("@id=1:2"), Segment::key("@id=1:2"));
    }

    #[test]
    fn test_parse_path_splits_on_dot() {
        assert_eq!(
            parse_path("a.b.c"),
            Path::from(vec![Segment::key("a"), Segment::key("b"), Segment::key("c")])
        );
        assert!(parse_path("").is_root());
    }

    #[test]
    fn test_format_roundtrip() {
        for s in ["", "a", "a.b.0", "x.-.-1", "a.*.b", "a.1:3", "a.::-1", "a.:2"] {
            assert_eq!(format_path(&parse_path(s)), s, "roundtrip of {s:?}");
        }
    }

    #[test]
    fn test_path_from_value() {
        assert_eq!(path_from_value(&json!(null)).unwrap(), Path::new());
        assert_eq!(path_from_value(&json!(4)).unwrap(), Path::from(4usize));
        assert_eq!(
            path_from_value(&json!(["a.b", 0, -1])).unwrap(),
            Path::from(vec![Segment::key("a.b"), Segment::Index(0), Segment::Last])
        );
        assert_eq!(path_from_value(&json!("a.b")).unwrap().len(), 2);
        assert!(path_from_value(&json!(-3)).is_err());
        assert!(path_from_value(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_path_to_value() {
        let path = parse_path("a.0.-");
        assert_eq!(path_to_value(&path), json!(["a", 0, "-"]));
    }
}
