//! Backend-driven cursors.
//!
//! An [`Entry`] is a shared [`Backend`] handle plus a path prefix. Composing
//! paths with [`Entry::child`] never touches the backend; reads and writes go
//! through it.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use spdm_path::{validate_path, validate_write_path, OnError, Path, PathTraverser, Segment};
use spdm_util::CachedProperty;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::node::{Kind, Node};

pub use memory::MemoryBackend;

/// The storage side of an [`Entry`].
///
/// Paths handed to a backend are absolute (the entry prefix included) and
/// never contain wildcards; they may contain slices, which select children
/// by position.
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short name used in log records.
    fn name(&self) -> &'static str;

    /// Every node matching `path`. Nothing found is an empty list.
    ///
    /// With `lazy` set, non-leaf matches come back as [`Resolved::Entry`];
    /// otherwise everything is materialized.
    fn fetch(&self, path: &[Segment], lazy: bool) -> Result<Vec<Resolved>>;

    /// Concrete child segments below `path`.
    fn children(&self, path: &[Segment]) -> Result<Vec<Segment>>;

    /// What `path` resolves to.
    fn kind(&self, path: &[Segment]) -> Result<Kind>;

    fn is_writable(&self) -> bool {
        false
    }

    fn put(&self, path: &[Segment], _value: Value) -> Result<()> {
        Err(Error::ReadOnly(format!(
            "{} backend, `{}`",
            self.name(),
            spdm_path::format_path(path)
        )))
    }

    fn remove(&self, path: &[Segment]) -> Result<()> {
        Err(Error::ReadOnly(format!(
            "{} backend, `{}`",
            self.name(),
            spdm_path::format_path(path)
        )))
    }
}

/// Result of a backend read.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Materialized data.
    Value(Value),
    /// Unresolved substructure.
    Entry(Entry),
    /// Several backend matches, in path order.
    List(Vec<Resolved>),
}

impl Resolved {
    /// Materialize everything, reading lazy parts eagerly.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Resolved::Value(v) => Ok(v),
            Resolved::Entry(e) => e.get_value(Path::new(), None, false)?.into_value(),
            Resolved::List(items) => items
                .into_iter()
                .map(Resolved::into_value)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
        }
    }

    pub fn into_node(self) -> Node {
        match self {
            Resolved::Value(v) => Node::from(v),
            Resolved::Entry(e) => Node::from(e),
            Resolved::List(items) => {
                Node::from(items.into_iter().map(Resolved::into_node).collect::<Vec<_>>())
            }
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Resolved::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match self {
            Resolved::Entry(e) => Some(e),
            _ => None,
        }
    }

    /// Hand `options` down to every lazy entry in the result.
    fn adopt(self, options: EntryOptions) -> Resolved {
        match self {
            Resolved::Entry(e) => Resolved::Entry(e.with_options(options)),
            Resolved::List(items) => {
                Resolved::List(items.into_iter().map(|r| r.adopt(options)).collect())
            }
            value @ Resolved::Value(_) => value,
        }
    }

    fn kind(&self) -> Result<Kind> {
        match self {
            Resolved::Value(Value::Object(_)) => Ok(Kind::Mapping),
            Resolved::Value(Value::Array(_)) | Resolved::List(_) => Ok(Kind::Sequence),
            Resolved::Value(Value::Null) => Ok(Kind::Empty),
            Resolved::Value(_) => Ok(Kind::Scalar),
            Resolved::Entry(e) => e.kind(),
        }
    }
}

/// Result of [`Entry::find`].
#[derive(Debug, Clone)]
pub enum Found {
    One(Resolved),
    Many(Vec<Resolved>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Failure policy for wildcard traversals and iteration.
    pub on_error: OnError,
}

/// Resolution state of one entry instance.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    Unresolved,
    Resolved(Kind),
    Error(Error),
}

#[derive(Clone)]
pub struct Entry {
    backend: Arc<dyn Backend>,
    prefix: Path,
    options: EntryOptions,
    state: Arc<CachedProperty<Result<Kind>>>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("backend", &self.backend.name())
            .field("prefix", &self.prefix.to_string())
            .field("state", &self.state())
            .finish()
    }
}

impl Entry {
    pub fn new(backend: Arc<dyn Backend>, prefix: impl Into<Path>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            options: EntryOptions::default(),
            state: Arc::new(CachedProperty::new()),
        }
    }

    pub fn with_options(mut self, options: EntryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_error(self, on_error: OnError) -> Self {
        self.with_options(EntryOptions { on_error })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn options(&self) -> EntryOptions {
        self.options
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn is_writable(&self) -> bool {
        self.backend.is_writable()
    }

    /// A new entry at `prefix + path`. No I/O.
    pub fn child(&self, path: impl Into<Path>) -> Entry {
        Entry {
            backend: self.backend.clone(),
            prefix: self.prefix.join(path),
            options: self.options,
            state: Arc::new(CachedProperty::new()),
        }
    }

    pub fn state(&self) -> EntryState {
        match self.state.get() {
            None => EntryState::Unresolved,
            Some(Ok(kind)) => EntryState::Resolved(*kind),
            Some(Err(e)) => EntryState::Error(e.clone()),
        }
    }

    /// What the prefix resolves to, computed once per entry instance.
    pub fn kind(&self) -> Result<Kind> {
        self.state
            .get_or_init(|| self.backend.kind(&self.prefix))
            .clone()
    }

    /// Number of children: mapping keys, sequence items, 1 for a scalar.
    pub fn count(&self) -> Result<usize> {
        match self.kind()? {
            Kind::Mapping | Kind::Sequence => Ok(self.backend.children(&self.prefix)?.len()),
            Kind::Scalar => Ok(1),
            Kind::Empty | Kind::Entry => Ok(0),
        }
    }

    /// Concrete child segments below `prefix + path`.
    pub fn children(&self, path: impl Into<Path>) -> Result<Vec<Segment>> {
        let full = self.prefix.join(path);
        self.backend.children(&full)
    }

    pub fn exists(&self, path: impl Into<Path>) -> bool {
        let full = self.prefix.join(path);
        matches!(self.collect(&full, true), Ok(found) if !found.is_empty())
    }

    /// Resolve `path` below the prefix.
    ///
    /// One match gives that match, several give a [`Resolved::List`].
    /// Nothing found gives `default` when supplied, `NotFound` otherwise.
    /// Wildcards and slices expand in path order.
    pub fn get_value(
        &self,
        path: impl Into<Path>,
        default: Option<Value>,
        lazy: bool,
    ) -> Result<Resolved> {
        let path = path.into();
        let full = self.prefix.join(&path);
        validate_path(&full)?;

        let outcome = self.collect(&full, lazy).map(|mut found| match found.len() {
            0 => None,
            1 if full.is_concrete() => found.pop(),
            _ => Some(Resolved::List(found)),
        });

        if path.is_root() && !self.state.is_computed() {
            let kind = match &outcome {
                Ok(Some(r)) => r.kind(),
                Ok(None) => Err(Error::NotFound(full.to_string())),
                Err(e) => Err(e.clone()),
            };
            self.state.get_or_init(|| kind);
        }

        match outcome? {
            Some(r) => Ok(r),
            None => match default {
                Some(v) => Ok(Resolved::Value(v)),
                None => Err(Error::NotFound(full.to_string())),
            },
        }
    }

    /// Find matches of `path`.
    ///
    /// With `only_one` unset every concrete match is returned. With it set
    /// exactly one backend node must match; anything else is
    /// `AmbiguousOrNotFound` unless a default is supplied.
    pub fn find(
        &self,
        path: impl Into<Path>,
        only_one: bool,
        default: Option<Value>,
    ) -> Result<Found> {
        let full = self.prefix.join(path);
        validate_path(&full)?;
        let mut found = match self.collect(&full, true) {
            Ok(found) => found,
            Err(Error::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };

        if !only_one {
            if found.is_empty() {
                if let Some(v) = default {
                    found.push(Resolved::Value(v));
                }
            }
            return Ok(Found::Many(found));
        }

        match (found.len(), default) {
            (1, _) => Ok(Found::One(found.remove(0))),
            (_, Some(v)) => Ok(Found::One(Resolved::Value(v))),
            (count, None) => Err(Error::AmbiguousOrNotFound {
                path: full.to_string(),
                count,
            }),
        }
    }

    pub fn put(&self, path: impl Into<Path>, value: Value) -> Result<()> {
        let full = self.prefix.join(path);
        validate_write_path(&full)?;
        if !self.backend.is_writable() {
            return Err(Error::ReadOnly(format!(
                "{} backend, `{full}`",
                self.backend.name()
            )));
        }
        debug!(backend = self.backend.name(), path = %full, "put");
        self.backend.put(&full, value)
    }

    pub fn remove(&self, path: impl Into<Path>) -> Result<()> {
        let full = self.prefix.join(path);
        validate_write_path(&full)?;
        if !self.backend.is_writable() {
            return Err(Error::ReadOnly(format!(
                "{} backend, `{full}`",
                self.backend.name()
            )));
        }
        debug!(backend = self.backend.name(), path = %full, "remove");
        self.backend.remove(&full)
    }

    /// `(segment, value)` pairs for the children of the prefix. The prefix may
    /// hold wildcards; children of every match are visited in order.
    pub fn items(&self) -> Result<EntryItems> {
        let mut pending = Vec::new();
        for prefix in self.expand(&self.prefix)? {
            match self.backend.children(&prefix) {
                Ok(children) => pending.extend(children.into_iter().map(|c| prefix.child(c))),
                Err(e) => self.skip_or_fail(&prefix, e)?,
            }
        }
        Ok(EntryItems {
            backend: self.backend.clone(),
            options: self.options,
            pending: pending.into_iter(),
        })
    }

    pub fn values(&self) -> Result<impl Iterator<Item = Result<Resolved>>> {
        Ok(self.items()?.map(|item| item.map(|(_, v)| v)))
    }

    pub fn iter(&self) -> Result<impl Iterator<Item = Result<Resolved>>> {
        self.values()
    }

    pub fn keys(&self) -> Result<Vec<Segment>> {
        let mut out = Vec::new();
        for prefix in self.expand(&self.prefix)? {
            match self.backend.children(&prefix) {
                Ok(children) => out.extend(children),
                Err(e) => self.skip_or_fail(&prefix, e)?,
            }
        }
        Ok(out)
    }

    /// Raw backend matches for the prefix itself.
    pub(crate) fn fetch_all(&self, lazy: bool) -> Result<Vec<Resolved>> {
        self.fetch(&self.prefix, lazy)
    }

    /// Backend fetch; entries the backend creates inherit these options.
    fn fetch(&self, path: &[Segment], lazy: bool) -> Result<Vec<Resolved>> {
        let found = self.backend.fetch(path, lazy)?;
        Ok(found.into_iter().map(|r| r.adopt(self.options)).collect())
    }

    fn expand(&self, full: &Path) -> Result<Vec<Path>> {
        PathTraverser::new(full)
            .on_error(self.options.on_error)
            .expand(|prefix| self.backend.children(prefix))
    }

    fn collect(&self, full: &Path, lazy: bool) -> Result<Vec<Resolved>> {
        if full.is_concrete() {
            return self.fetch(full, lazy);
        }
        let per_path = PathTraverser::new(full)
            .on_error(self.options.on_error)
            .apply(
                |prefix| self.backend.children(prefix),
                |p| self.fetch(p, lazy),
            )?;
        Ok(per_path.into_iter().flatten().collect())
    }

    fn skip_or_fail(&self, path: &Path, error: Error) -> Result<()> {
        match self.options.on_error {
            OnError::Abort => Err(error),
            OnError::Skip => {
                warn!(backend = self.backend.name(), %path, %error, "skipping branch");
                Ok(())
            }
        }
    }
}

/// Iterator returned by [`Entry::items`]. Each child is fetched when reached.
pub struct EntryItems {
    backend: Arc<dyn Backend>,
    options: EntryOptions,
    pending: std::vec::IntoIter<Path>,
}

impl Iterator for EntryItems {
    type Item = Result<(Segment, Resolved)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = self.pending.next()?;
            let Some(segment) = path.last().cloned() else {
                continue;
            };
            let result = self.backend.fetch(&path, true).and_then(|mut found| match found.len() {
                0 => Err(Error::NotFound(path.to_string())),
                1 => Ok(found.remove(0).adopt(self.options)),
                _ => Ok(Resolved::List(found).adopt(self.options)),
            });
            match result {
                Ok(value) => return Some(Ok((segment, value))),
                Err(error) => match self.options.on_error {
                    OnError::Abort => return Some(Err(error)),
                    OnError::Skip => {
                        warn!(backend = self.backend.name(), %path, %error, "skipping child");
                    }
                },
            }
        }
    }
}
