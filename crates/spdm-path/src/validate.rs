//! Validation functions for paths.

use crate::types::Segment;
use crate::PathError;

/// Maximum allowed path depth.
pub const MAX_PATH_LENGTH: usize = 256;

/// Validate a path.
///
/// # Errors
///
/// Returns an error if:
/// - The path exceeds the maximum depth (256 segments)
/// - A key segment is empty
///
/// # Example
///
/// ```
/// use spdm_path::{parse_path, validate_path};
///
/// validate_path(&parse_path("a.b.0")).unwrap();
/// validate_path(&parse_path("a..b")).unwrap_err();
/// ```
pub fn validate_path(path: &[Segment]) -> Result<(), PathError> {
    if path.len() > MAX_PATH_LENGTH {
        return Err(PathError::PathTooLong);
    }
    for segment in path {
        if let Segment::Key(k) = segment {
            if k.is_empty() {
                return Err(PathError::InvalidPathStep(String::new()));
            }
        }
    }
    Ok(())
}

/// Validate a path used for writing: patterns are rejected.
pub fn validate_write_path(path: &[Segment]) -> Result<(), PathError> {
    validate_path(path)?;
    if let Some(seg) = path.iter().find(|s| s.is_pattern()) {
        return Err(PathError::NotConcrete(seg.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_path;

    #[test]
    fn test_validate_short_path() {
        assert!(validate_path(&parse_path("foo.bar")).is_ok());
    }

    #[test]
    fn test_validate_long_path() {
        let path: Vec<Segment> = (0..300).map(Segment::Index).collect();
        assert_eq!(validate_path(&path), Err(PathError::PathTooLong));
    }

    #[test]
    fn test_validate_max_length_path() {
        let path: Vec<Segment> = (0..256).map(Segment::Index).collect();
        assert!(validate_path(&path).is_ok());
    }

    #[test]
    fn test_validate_write_path_rejects_wildcard() {
        assert!(validate_write_path(&parse_path("a.*")).is_err());
        assert!(validate_write_path(&parse_path("a.-")).is_ok());
    }
}
