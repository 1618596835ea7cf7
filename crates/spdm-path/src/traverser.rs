//! Wildcard and slice expansion.
//!
//! A [`PathTraverser`] turns a path containing pattern segments into the list
//! of concrete paths it stands for. The traverser knows nothing about the
//! data; the caller supplies a callback listing the concrete child segments
//! below a concrete prefix.

use std::fmt;

use tracing::warn;

use crate::types::{slice_indices, Path, Segment};

/// What a traversal does when one branch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnError {
    /// Propagate the first error.
    #[default]
    Abort,
    /// Log the failure and continue with the remaining branches.
    Skip,
}

/// Expands pattern segments of a path into concrete paths.
#[derive(Debug, Clone, Copy)]
pub struct PathTraverser<'a> {
    path: &'a [Segment],
    on_error: OnError,
}

impl<'a> PathTraverser<'a> {
    pub fn new(path: &'a [Segment]) -> Self {
        Self {
            path,
            on_error: OnError::Abort,
        }
    }

    pub fn on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    /// `true` when the path has no wildcard or slice.
    pub fn is_trivial(&self) -> bool {
        !self.path.iter().any(Segment::is_pattern)
    }

    /// Expand the path into concrete paths, in the order the callback reports
    /// children.
    pub fn expand<E, C>(&self, mut children: C) -> Result<Vec<Path>, E>
    where
        C: FnMut(&[Segment]) -> Result<Vec<Segment>, E>,
        E: fmt::Display,
    {
        let mut frontier = vec![Path::new()];

        for segment in self.path {
            let mut next = Vec::with_capacity(frontier.len());
            for prefix in &frontier {
                match segment {
                    Segment::Wildcard => match children(prefix.segments()) {
                        Ok(list) => next.extend(list.into_iter().map(|c| prefix.child(c))),
                        Err(e) => self.fail(prefix, e)?,
                    },
                    Segment::Slice { start, stop, step } => match children(prefix.segments()) {
                        Ok(list) => {
                            for i in slice_indices(*start, *stop, *step, list.len()) {
                                next.push(prefix.child(list[i].clone()));
                            }
                        }
                        Err(e) => self.fail(prefix, e)?,
                    },
                    other => next.push(prefix.child(other.clone())),
                }
            }
            frontier = next;
        }

        Ok(frontier)
    }

    /// Expand the path and evaluate `f` on every concrete path.
    pub fn apply<T, E, C, F>(&self, children: C, mut f: F) -> Result<Vec<T>, E>
    where
        C: FnMut(&[Segment]) -> Result<Vec<Segment>, E>,
        F: FnMut(&Path) -> Result<T, E>,
        E: fmt::Display,
    {
        let paths = self.expand(children)?;
        let mut out = Vec::with_capacity(paths.len());
        for path in &paths {
            match f(path) {
                Ok(v) => out.push(v),
                Err(e) => self.fail(path, e)?,
            }
        }
        Ok(out)
    }

    fn fail<E: fmt::Display>(&self, path: &[Segment], error: E) -> Result<(), E> {
        match self.on_error {
            OnError::Abort => Err(error),
            OnError::Skip => {
                warn!(path = %crate::format_path(path), %error, "skipping branch");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_path;

    fn tree_children(prefix: &[Segment]) -> Result<Vec<Segment>, String> {
        match crate::format_path(prefix).as_str() {
            "" => Ok(vec![Segment::key("a"), Segment::key("b")]),
            "a" => Ok(vec![Segment::Index(0), Segment::Index(1), Segment::Index(2)]),
            "b" => Err("b is a leaf".to_string()),
            other => Err(format!("no children at {other}")),
        }
    }

    #[test]
    fn test_trivial_path_expands_to_itself() {
        let path = parse_path("a.0.x");
        let out = PathTraverser::new(&path).expand(tree_children).unwrap();
        assert_eq!(out, vec![path.clone()]);
    }

    #[test]
    fn test_wildcard_expansion_order() {
        let path = parse_path("a.*");
        let out = PathTraverser::new(&path).expand(tree_children).unwrap();
        let printed: Vec<String> = out.iter().map(|p| p.to_string()).collect();
        assert_eq!(printed, vec!["a.0", "a.1", "a.2"]);
    }

    #[test]
    fn test_slice_expansion() {
        let path = parse_path("a.1:");
        let out = PathTraverser::new(&path).expand(tree_children).unwrap();
        let printed: Vec<String> = out.iter().map(|p| p.to_string()).collect();
        assert_eq!(printed, vec!["a.1", "a.2"]);
    }

    #[test]
    fn test_abort_propagates() {
        let path = parse_path("*.*");
        let out = PathTraverser::new(&path).expand(tree_children);
        assert_eq!(out, Err("b is a leaf".to_string()));
    }

    #[test]
    fn test_skip_continues() {
        let path = parse_path("*.*");
        let out = PathTraverser::new(&path)
            .on_error(OnError::Skip)
            .expand(tree_children)
            .unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_apply_skips_failed_evaluations() {
        let path = parse_path("a.*");
        let out = PathTraverser::new(&path)
            .on_error(OnError::Skip)
            .apply(tree_children, |p| match p.last() {
                Some(Segment::Index(1)) => Err("broken".to_string()),
                _ => Ok(p.to_string()),
            })
            .unwrap();
        assert_eq!(out, vec!["a.0".to_string(), "a.2".to_string()]);
    }
}
