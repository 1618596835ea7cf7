//! In-memory polymorphic tree node.
//!
//! A [`Node`] holds exactly one [`NodeData`] variant. Containers own their
//! children; a node wrapping an [`Entry`] forwards every read and write to
//! that entry's backend.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use spdm_path::{
    slice_indices, validate_path, validate_write_path, OnError, Path, PathError, PathTraverser,
    Segment,
};
use tracing::warn;

use crate::entry::{Entry, Resolved};
use crate::error::{Error, Result};

/// Which variant a node (or a resolved entry) holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Empty,
    Mapping,
    Sequence,
    Scalar,
    Entry,
}

/// The class of a node: a factory for children and a hook applied to every
/// value before it is stored.
pub trait NodeClass: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Class of a child created under `segment`. `None` keeps the parent's.
    fn child_class(&self, _segment: &Segment) -> Option<Arc<dyn NodeClass>> {
        None
    }

    /// Transform a value about to be stored in a node of this class.
    fn pre_process(&self, node: Node) -> Result<Node> {
        Ok(node)
    }
}

#[derive(Debug)]
struct GenericClass;

impl NodeClass for GenericClass {
    fn name(&self) -> &str {
        "general"
    }
}

/// Where [`Node::locate`] stopped.
pub(crate) enum Located<'a> {
    Node(&'a Node),
    /// An entry-backed node and the segments below it.
    Entry(&'a Entry, &'a [Segment]),
    /// The append slot of a sequence.
    Vacant,
}

/// The class used by nodes built without an explicit class.
pub fn generic_class() -> Arc<dyn NodeClass> {
    static CLASS: OnceLock<Arc<dyn NodeClass>> = OnceLock::new();
    CLASS.get_or_init(|| Arc::new(GenericClass)).clone()
}

#[derive(Debug, Clone, Default)]
pub enum NodeData {
    #[default]
    Empty,
    Mapping(IndexMap<String, Node>),
    Sequence(Vec<Node>),
    Scalar(Value),
    Entry(Entry),
}

#[derive(Clone)]
pub struct Node {
    data: NodeData,
    class: Arc<dyn NodeClass>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("class", &self.class.name())
            .field("data", &self.data)
            .finish()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// An empty node of the generic class.
    pub fn new() -> Self {
        Self::with_class(generic_class())
    }

    pub fn with_class(class: Arc<dyn NodeClass>) -> Self {
        Self {
            data: NodeData::Empty,
            class,
        }
    }

    pub fn from_data(data: NodeData) -> Self {
        Self {
            data,
            class: generic_class(),
        }
    }

    /// A fresh empty node of this node's class.
    pub fn new_node(&self) -> Node {
        Node::with_class(self.class.clone())
    }

    fn new_child(&self, segment: &Segment) -> Node {
        Node::with_class(self.child_class(segment))
    }

    fn child_class(&self, segment: &Segment) -> Arc<dyn NodeClass> {
        self.class
            .child_class(segment)
            .unwrap_or_else(|| self.class.clone())
    }

    pub fn class(&self) -> &Arc<dyn NodeClass> {
        &self.class
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn into_data(self) -> NodeData {
        self.data
    }

    fn is_generic(&self) -> bool {
        Arc::ptr_eq(&self.class, &generic_class())
    }

    /// Give a generic-class subtree the class of its new parent.
    fn adopt(mut self, class: Arc<dyn NodeClass>) -> Node {
        if !self.is_generic() {
            return self;
        }
        match &mut self.data {
            NodeData::Mapping(map) => {
                for (k, child) in map.iter_mut() {
                    let child_class = class
                        .child_class(&Segment::key(k.as_str()))
                        .unwrap_or_else(|| class.clone());
                    *child = std::mem::take(child).adopt(child_class);
                }
            }
            NodeData::Sequence(items) => {
                for (i, child) in items.iter_mut().enumerate() {
                    let child_class = class
                        .child_class(&Segment::Index(i))
                        .unwrap_or_else(|| class.clone());
                    *child = std::mem::take(child).adopt(child_class);
                }
            }
            _ => {}
        }
        self.class = class;
        self
    }

    // ── Variant accessors ─────────────────────────────────────────────────

    pub fn kind(&self) -> Kind {
        match &self.data {
            NodeData::Empty => Kind::Empty,
            NodeData::Mapping(_) => Kind::Mapping,
            NodeData::Sequence(_) => Kind::Sequence,
            NodeData::Scalar(_) => Kind::Scalar,
            NodeData::Entry(_) => Kind::Entry,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.data {
            NodeData::Empty => true,
            NodeData::Mapping(m) => m.is_empty(),
            NodeData::Sequence(v) => v.is_empty(),
            NodeData::Scalar(_) => false,
            NodeData::Entry(_) => self.len() == 0,
        }
    }

    /// Number of children: mapping keys, sequence items, 1 for a scalar.
    ///
    /// Entry-backed nodes ask the backend; a failure counts as 0.
    pub fn len(&self) -> usize {
        match &self.data {
            NodeData::Empty => 0,
            NodeData::Mapping(m) => m.len(),
            NodeData::Sequence(v) => v.len(),
            NodeData::Scalar(_) => 1,
            NodeData::Entry(e) => e.count().unwrap_or_else(|error| {
                warn!(prefix = %e.prefix(), %error, "count failed");
                0
            }),
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Node>> {
        match &self.data {
            NodeData::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut IndexMap<String, Node>> {
        match &mut self.data {
            NodeData::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.data {
            NodeData::Sequence(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.data {
            NodeData::Sequence(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match &self.data {
            NodeData::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Entry> {
        match &self.data {
            NodeData::Entry(e) => Some(e),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        match &self.data {
            NodeData::Mapping(m) => m.contains_key(key),
            NodeData::Entry(e) => e.exists(Segment::key(key)),
            _ => false,
        }
    }

    /// Drop the content; the node becomes `Empty`.
    pub fn clear(&mut self) {
        self.data = NodeData::Empty;
    }

    // ── Reading ───────────────────────────────────────────────────────────

    /// Resolve `path` against this node.
    ///
    /// Wildcard and slice segments expand into a sequence node holding one
    /// child per concrete match, in path order.
    pub fn get(&self, path: impl Into<Path>) -> Result<Node> {
        let path = path.into();
        validate_path(&path)?;
        if let NodeData::Entry(e) = &self.data {
            return e.get_value(path, None, true).map(Resolved::into_node);
        }
        if path.is_concrete() {
            return self.get_concrete(&path);
        }
        let matches = PathTraverser::new(&path)
            .on_error(OnError::Abort)
            .apply(|prefix| self.child_segments_at(prefix), |p| self.get_concrete(p))?;
        let mut out = self.new_node();
        out.data = NodeData::Sequence(matches);
        Ok(out)
    }

    fn get_concrete(&self, path: &[Segment]) -> Result<Node> {
        let mut cur = self;
        for (i, seg) in path.iter().enumerate() {
            match (&cur.data, seg) {
                (NodeData::Entry(e), _) => {
                    return e.get_value(&path[i..], None, true).map(Resolved::into_node);
                }
                (NodeData::Empty | NodeData::Sequence(_), Segment::Next) => {
                    let fresh = cur.new_child(seg);
                    return match path.get(i + 1) {
                        None => Ok(fresh),
                        Some(rest) => Err(Error::NotFound(rest.to_string())),
                    };
                }
                _ => cur = cur.child(seg)?,
            }
        }
        Ok(cur.clone())
    }

    /// Borrow the direct child addressed by `segment`.
    pub fn child(&self, segment: &Segment) -> Result<&Node> {
        match (&self.data, segment) {
            (NodeData::Mapping(m), Segment::Key(k)) => {
                m.get(k).ok_or_else(|| Error::NotFound(k.clone()))
            }
            (NodeData::Sequence(v), Segment::Index(i)) => v
                .get(*i)
                .ok_or_else(|| Error::OutOfRange(format!("{i} >= {}", v.len()))),
            (NodeData::Sequence(v), Segment::Last) => v
                .last()
                .ok_or_else(|| Error::OutOfRange("last of an empty sequence".to_string())),
            (NodeData::Sequence(_), Segment::Next) => {
                Err(Error::OutOfRange("the append slot holds no value".to_string()))
            }
            (NodeData::Sequence(_), Segment::Key(k)) => Err(Error::TypeConflict(format!(
                "key `{k}` used on a sequence"
            ))),
            (NodeData::Mapping(_), Segment::Index(_) | Segment::Last | Segment::Next) => Err(
                Error::TypeConflict(format!("index `{segment}` used on a mapping")),
            ),
            (NodeData::Entry(_), _) => Err(Error::TypeConflict(
                "entry-backed node has no in-memory children".to_string(),
            )),
            (_, Segment::Wildcard | Segment::Slice { .. }) => {
                Err(PathError::NotConcrete(segment.to_string()).into())
            }
            (NodeData::Empty | NodeData::Scalar(_), _) => {
                Err(Error::NotFound(segment.to_string()))
            }
        }
    }

    /// Concrete child segments: mapping keys or sequence indices.
    pub fn child_segments(&self) -> Result<Vec<Segment>> {
        match &self.data {
            NodeData::Mapping(m) => Ok(m.keys().map(|k| Segment::key(k.as_str())).collect()),
            NodeData::Sequence(v) => Ok((0..v.len()).map(Segment::Index).collect()),
            NodeData::Entry(e) => e.children(Path::new()),
            NodeData::Empty | NodeData::Scalar(_) => Ok(Vec::new()),
        }
    }

    fn child_segments_at(&self, prefix: &[Segment]) -> Result<Vec<Segment>> {
        match self.locate(prefix)? {
            Located::Node(node) => node.child_segments(),
            Located::Entry(e, rest) => e.children(rest),
            Located::Vacant => Ok(Vec::new()),
        }
    }

    /// Follow a concrete path by reference. Stops at the first entry-backed
    /// node and hands back the segments still to resolve through it.
    pub(crate) fn locate<'a>(&'a self, path: &'a [Segment]) -> Result<Located<'a>> {
        let mut cur = self;
        for (i, seg) in path.iter().enumerate() {
            match (&cur.data, seg) {
                (NodeData::Entry(e), _) => return Ok(Located::Entry(e, &path[i..])),
                (NodeData::Empty | NodeData::Sequence(_), Segment::Next) => {
                    return match path.get(i + 1) {
                        None => Ok(Located::Vacant),
                        Some(rest) => Err(Error::NotFound(rest.to_string())),
                    };
                }
                _ => cur = cur.child(seg)?,
            }
        }
        Ok(Located::Node(cur))
    }

    /// Mutable in-memory navigation. `Next` appends a fresh child.
    pub fn get_mut(&mut self, path: impl Into<Path>) -> Result<&mut Node> {
        let path = path.into();
        validate_write_path(&path)?;
        let mut cur = self;
        for seg in path.iter() {
            cur = cur.child_mut(seg, false)?;
        }
        Ok(cur)
    }

    fn child_mut(&mut self, segment: &Segment, create: bool) -> Result<&mut Node> {
        let fresh = self.new_child(segment);
        if matches!(self.data, NodeData::Empty) {
            match segment {
                Segment::Key(_) if create => self.data = NodeData::Mapping(IndexMap::new()),
                Segment::Index(_) if create => self.data = NodeData::Sequence(Vec::new()),
                Segment::Next => self.data = NodeData::Sequence(Vec::new()),
                _ => {}
            }
        }
        match (&mut self.data, segment) {
            (NodeData::Mapping(m), Segment::Key(k)) => {
                if create {
                    Ok(m.entry(k.clone()).or_insert(fresh))
                } else {
                    m.get_mut(k).ok_or_else(|| Error::NotFound(k.clone()))
                }
            }
            (NodeData::Sequence(v), Segment::Index(i)) => {
                let len = v.len();
                if *i == len && create {
                    v.push(fresh);
                }
                v.get_mut(*i)
                    .ok_or_else(|| Error::OutOfRange(format!("{i} >= {len}")))
            }
            (NodeData::Sequence(v), Segment::Next) => {
                v.push(fresh);
                let last = v.len() - 1;
                Ok(&mut v[last])
            }
            (NodeData::Sequence(v), Segment::Last) => v
                .last_mut()
                .ok_or_else(|| Error::OutOfRange("last of an empty sequence".to_string())),
            (NodeData::Sequence(_), Segment::Key(k)) => Err(Error::TypeConflict(format!(
                "key `{k}` used on a sequence"
            ))),
            (NodeData::Mapping(_), Segment::Index(_) | Segment::Next | Segment::Last) => Err(
                Error::TypeConflict(format!("index `{segment}` used on a mapping")),
            ),
            (NodeData::Entry(_), _) => Err(Error::TypeConflict(
                "entry-backed node has no in-memory children".to_string(),
            )),
            (_, Segment::Wildcard | Segment::Slice { .. }) => {
                Err(PathError::NotConcrete(segment.to_string()).into())
            }
            (NodeData::Scalar(_), _) if create => Err(Error::TypeConflict(format!(
                "cannot create `{segment}` below a scalar"
            ))),
            (NodeData::Empty | NodeData::Scalar(_), _) => {
                Err(Error::NotFound(segment.to_string()))
            }
        }
    }

    // ── Writing ───────────────────────────────────────────────────────────

    /// Store `value` at `path`, creating intermediate containers.
    ///
    /// A key forces a mapping, an index or marker forces a sequence. An index
    /// equal to the current length appends.
    pub fn set(&mut self, path: impl Into<Path>, value: impl Into<Node>) -> Result<()> {
        let path = path.into();
        validate_write_path(&path)?;
        let value = value.into();
        let mut cur = self;
        for (i, seg) in path.iter().enumerate() {
            if let NodeData::Entry(e) = &cur.data {
                return e.put(&path[i..], value.serialize()?);
            }
            cur = cur.child_mut(seg, true)?;
        }
        cur.assign(value)
    }

    fn assign(&mut self, value: Node) -> Result<()> {
        if let NodeData::Entry(e) = &self.data {
            if !matches!(value.data, NodeData::Entry(_)) {
                return e.put(Path::new(), value.serialize()?);
            }
        }
        let value = value.adopt(self.class.clone());
        let value = self.class.pre_process(value)?;
        self.data = value.data;
        Ok(())
    }

    /// Remove the child addressed by `path`. An empty path clears the node.
    pub fn delete(&mut self, path: impl Into<Path>) -> Result<()> {
        let path = path.into();
        validate_write_path(&path)?;
        let Some((last, parents)) = path.split_last() else {
            self.clear();
            return Ok(());
        };
        let mut cur = self;
        for (i, seg) in parents.iter().enumerate() {
            if let NodeData::Entry(e) = &cur.data {
                return e.remove(&path[i..]);
            }
            cur = cur.child_mut(seg, false)?;
        }
        match (&mut cur.data, last) {
            (NodeData::Entry(e), _) => e.remove(Path::from(last.clone())),
            (NodeData::Mapping(m), Segment::Key(k)) => m
                .shift_remove(k)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(k.clone())),
            (NodeData::Sequence(v), Segment::Index(i)) => {
                if *i < v.len() {
                    v.remove(*i);
                    Ok(())
                } else {
                    Err(Error::OutOfRange(format!("{i} >= {}", v.len())))
                }
            }
            (NodeData::Sequence(v), Segment::Last) => v
                .pop()
                .map(|_| ())
                .ok_or_else(|| Error::OutOfRange("last of an empty sequence".to_string())),
            (NodeData::Sequence(_), Segment::Next) => {
                Err(Error::OutOfRange("the append slot holds no value".to_string()))
            }
            (NodeData::Sequence(_), _) => Err(Error::TypeConflict(format!(
                "`{last}` does not address a sequence slot"
            ))),
            (NodeData::Mapping(_), _) => Err(Error::TypeConflict(format!(
                "index `{last}` used on a mapping"
            ))),
            (NodeData::Empty | NodeData::Scalar(_), _) => Err(Error::NotFound(last.to_string())),
        }
    }

    /// Merge a mapping or sequence into this node.
    ///
    /// Mappings merge per key, recursively; a sequence is appended. Scalars
    /// in `other` replace what is there.
    pub fn update(&mut self, other: impl Into<Node>) -> Result<()> {
        let other: Node = other.into();
        match other.data {
            NodeData::Empty => Ok(()),
            NodeData::Mapping(src) => {
                if matches!(self.data, NodeData::Empty) {
                    self.data = NodeData::Mapping(IndexMap::new());
                }
                if let NodeData::Entry(e) = &self.data {
                    for (k, v) in src {
                        e.put(Segment::key(k), v.serialize()?)?;
                    }
                    return Ok(());
                }
                if !matches!(self.data, NodeData::Mapping(_)) {
                    return Err(Error::TypeConflict(format!(
                        "cannot merge a mapping into a {:?} node",
                        self.kind()
                    )));
                }
                let class = self.class.clone();
                let NodeData::Mapping(dst) = &mut self.data else {
                    return Ok(());
                };
                for (k, v) in src {
                    match dst.get_mut(&k) {
                        Some(slot) => slot.merge_child(v)?,
                        None => {
                            let child_class = class
                                .child_class(&Segment::key(k.as_str()))
                                .unwrap_or_else(|| class.clone());
                            let mut child = Node::with_class(child_class);
                            child.assign(v)?;
                            dst.insert(k, child);
                        }
                    }
                }
                Ok(())
            }
            NodeData::Sequence(items) => {
                if matches!(self.data, NodeData::Empty) {
                    self.data = NodeData::Sequence(Vec::new());
                }
                if let NodeData::Entry(e) = &self.data {
                    for v in items {
                        e.put(Segment::Next, v.serialize()?)?;
                    }
                    return Ok(());
                }
                if !matches!(self.data, NodeData::Sequence(_)) {
                    return Err(Error::TypeConflict(format!(
                        "cannot append a sequence to a {:?} node",
                        self.kind()
                    )));
                }
                for v in items {
                    let slot = self.child_mut(&Segment::Next, true)?;
                    slot.assign(v)?;
                }
                Ok(())
            }
            NodeData::Scalar(_) | NodeData::Entry(_) => Err(Error::TypeConflict(
                "update expects a mapping or a sequence".to_string(),
            )),
        }
    }

    fn merge_child(&mut self, value: Node) -> Result<()> {
        let compatible = matches!(
            (&self.data, &value.data),
            (NodeData::Mapping(_), NodeData::Mapping(_))
                | (NodeData::Sequence(_), NodeData::Sequence(_))
                | (NodeData::Entry(_), NodeData::Mapping(_) | NodeData::Sequence(_))
        );
        if compatible {
            self.update(value)
        } else {
            self.assign(value)
        }
    }

    // ── Iteration and conversion ──────────────────────────────────────────

    /// Children as `(segment, node)` pairs. A scalar yields itself once with
    /// no segment.
    pub fn iter(&self) -> NodeIter<'_> {
        match &self.data {
            NodeData::Empty => NodeIter::Done,
            NodeData::Mapping(m) => NodeIter::Mapping(m.iter()),
            NodeData::Sequence(v) => NodeIter::Sequence(v.iter().enumerate()),
            NodeData::Scalar(_) => NodeIter::Scalar(Some(self)),
            NodeData::Entry(e) => match e.items() {
                Ok(items) => NodeIter::Entry(Box::new(items)),
                Err(error) => NodeIter::Failed(Some(error)),
            },
        }
    }

    /// Plain nested value of the whole tree; entry-backed parts are read
    /// eagerly.
    pub fn serialize(&self) -> Result<Value> {
        match &self.data {
            NodeData::Empty => Ok(Value::Null),
            NodeData::Scalar(v) => Ok(v.clone()),
            NodeData::Mapping(m) => {
                let mut out = Map::with_capacity(m.len());
                for (k, v) in m {
                    out.insert(k.clone(), v.serialize()?);
                }
                Ok(Value::Object(out))
            }
            NodeData::Sequence(items) => items
                .iter()
                .map(Node::serialize)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            NodeData::Entry(e) => e.get_value(Path::new(), None, false)?.into_value(),
        }
    }

    /// Inverse of [`serialize`](Self::serialize).
    pub fn deserialize(value: Value) -> Node {
        Node::from(value)
    }
}

/// Iterator returned by [`Node::iter`].
pub enum NodeIter<'a> {
    Done,
    Mapping(indexmap::map::Iter<'a, String, Node>),
    Sequence(std::iter::Enumerate<std::slice::Iter<'a, Node>>),
    Scalar(Option<&'a Node>),
    Entry(Box<dyn Iterator<Item = Result<(Segment, Resolved)>> + 'a>),
    Failed(Option<Error>),
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = Result<(Option<Segment>, Cow<'a, Node>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            NodeIter::Done => None,
            NodeIter::Mapping(it) => it
                .next()
                .map(|(k, v)| Ok((Some(Segment::key(k.as_str())), Cow::Borrowed(v)))),
            NodeIter::Sequence(it) => it
                .next()
                .map(|(i, v)| Ok((Some(Segment::Index(i)), Cow::Borrowed(v)))),
            NodeIter::Scalar(node) => node.take().map(|n| Ok((None, Cow::Borrowed(n)))),
            NodeIter::Entry(it) => it
                .next()
                .map(|item| item.map(|(seg, r)| (Some(seg), Cow::Owned(r.into_node())))),
            NodeIter::Failed(error) => error.take().map(Err),
        }
    }
}

impl<'a> IntoIterator for &'a Node {
    type Item = Result<(Option<Segment>, Cow<'a, Node>)>;
    type IntoIter = NodeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        let data = match value {
            Value::Null => NodeData::Empty,
            Value::Object(map) => {
                NodeData::Mapping(map.into_iter().map(|(k, v)| (k, Node::from(v))).collect())
            }
            Value::Array(items) => NodeData::Sequence(items.into_iter().map(Node::from).collect()),
            scalar => NodeData::Scalar(scalar),
        };
        Node::from_data(data)
    }
}

impl From<Entry> for Node {
    fn from(entry: Entry) -> Self {
        Node::from_data(NodeData::Entry(entry))
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::from_data(NodeData::Sequence(items))
    }
}

impl From<IndexMap<String, Node>> for Node {
    fn from(map: IndexMap<String, Node>) -> Self {
        Node::from_data(NodeData::Mapping(map))
    }
}

macro_rules! scalar_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Node {
                fn from(v: $t) -> Self {
                    Node::from(Value::from(v))
                }
            }
        )*
    };
}

scalar_from!(bool, i32, i64, u32, u64, usize, f64, &str, String);

/// Select the children of `node` matched by a slice.
pub(crate) fn slice_children<'a>(
    node: &'a Node,
    start: Option<isize>,
    stop: Option<isize>,
    step: Option<isize>,
) -> Result<Vec<(Segment, &'a Node)>> {
    let segments = node.child_segments()?;
    slice_indices(start, stop, step, segments.len())
        .into_iter()
        .map(|i| {
            let seg = segments[i].clone();
            node.child(&seg).map(|child| (seg, child))
        })
        .collect()
}
