//! Writable backend over an in-memory [`Node`] tree.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use spdm_path::{Path, Segment};

use super::{Backend, Entry, Resolved};
use crate::error::{Error, Result};
use crate::node::{slice_children, Kind, Located, Node, NodeData};

#[derive(Debug, Clone)]
pub struct MemoryBackend {
    root: Arc<RwLock<Node>>,
    writable: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(Node::new())
    }
}

impl MemoryBackend {
    pub fn new(root: impl Into<Node>) -> Self {
        Self {
            root: Arc::new(RwLock::new(root.into())),
            writable: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// An entry at the root of the tree.
    pub fn entry(&self) -> Entry {
        Entry::new(Arc::new(self.clone()), Path::new())
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> Node {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Node> {
        self.root.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Node> {
        self.root.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn select(
        &self,
        node: &Node,
        at: Path,
        rest: &[Segment],
        lazy: bool,
    ) -> Result<Vec<Resolved>> {
        if let NodeData::Entry(e) = node.data() {
            return e.child(rest).fetch_all(lazy);
        }
        let Some((seg, tail)) = rest.split_first() else {
            return Ok(vec![self.resolve_here(node, at, lazy)?]);
        };
        match seg {
            Segment::Slice { start, stop, step } => {
                let mut out = Vec::new();
                for (child_seg, child) in slice_children(node, *start, *stop, *step)? {
                    out.extend(self.select(child, at.child(child_seg), tail, lazy)?);
                }
                Ok(out)
            }
            Segment::Wildcard | Segment::Next => Ok(Vec::new()),
            _ => match node.child(seg) {
                Ok(child) => self.select(child, at.child(seg.clone()), tail, lazy),
                Err(Error::NotFound(_) | Error::OutOfRange(_)) => Ok(Vec::new()),
                Err(e) => Err(e),
            },
        }
    }

    /// Lazy reads stay lazy for mappings and for sequences holding
    /// containers. Plain arrays are leaves and come back as values.
    fn resolve_here(&self, node: &Node, at: Path, lazy: bool) -> Result<Resolved> {
        match node.data() {
            NodeData::Mapping(_) if lazy => {
                Ok(Resolved::Entry(Entry::new(Arc::new(self.clone()), at)))
            }
            NodeData::Sequence(items) if lazy && items.iter().any(is_container) => {
                Ok(Resolved::Entry(Entry::new(Arc::new(self.clone()), at)))
            }
            NodeData::Entry(e) if lazy => Ok(Resolved::Entry(e.clone())),
            _ => Ok(Resolved::Value(node.serialize()?)),
        }
    }
}

fn is_container(node: &Node) -> bool {
    matches!(
        node.data(),
        NodeData::Mapping(_) | NodeData::Sequence(_) | NodeData::Entry(_)
    )
}

// Slices select several nodes at once and need the copying path.
fn has_slice(path: &[Segment]) -> bool {
    path.iter().any(|s| matches!(s, Segment::Slice { .. }))
}

impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch(&self, path: &[Segment], lazy: bool) -> Result<Vec<Resolved>> {
        let root = self.read();
        self.select(&root, Path::new(), path, lazy)
    }

    fn children(&self, path: &[Segment]) -> Result<Vec<Segment>> {
        let root = self.read();
        if has_slice(path) {
            return root.get(path)?.child_segments();
        }
        match root.locate(path)? {
            Located::Node(node) => node.child_segments(),
            Located::Entry(e, rest) => e.children(rest),
            Located::Vacant => Ok(Vec::new()),
        }
    }

    fn kind(&self, path: &[Segment]) -> Result<Kind> {
        let root = self.read();
        if has_slice(path) {
            return Ok(root.get(path)?.kind());
        }
        match root.locate(path)? {
            Located::Node(node) => match node.as_entry() {
                Some(e) => e.kind(),
                None => Ok(node.kind()),
            },
            Located::Entry(e, rest) => e.child(rest).kind(),
            Located::Vacant => Ok(Kind::Empty),
        }
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn put(&self, path: &[Segment], value: Value) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnly(format!("memory backend, `{}`", Path::from(path))));
        }
        self.write().set(path, value)
    }

    fn remove(&self, path: &[Segment]) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnly(format!("memory backend, `{}`", Path::from(path))));
        }
        self.write().delete(path)
    }
}
