use std::path::Path as FsPath;
use std::sync::Arc;

use serde_json::{Map, Value};
use spdm_path::{Path, Segment};

use super::{decode_leaf, is_leaf, select, to_value, ElementId, XmlTree};
use crate::entry::{Backend, Entry, Resolved};
use crate::error::{Error, Result};
use crate::node::Kind;

/// Read-only backend over a parsed XML tree.
///
/// Lazy reads of non-leaf elements return entries re-rooted at the element;
/// they share the tree.
#[derive(Debug, Clone)]
pub struct XmlBackend {
    tree: Arc<XmlTree>,
    root: ElementId,
    vars: Map<String, Value>,
}

impl XmlBackend {
    pub fn new(tree: Arc<XmlTree>) -> Self {
        let root = tree.root();
        Self {
            tree,
            root,
            vars: Map::new(),
        }
    }

    pub fn load(path: impl AsRef<FsPath>) -> Result<Self> {
        Ok(Self::new(Arc::new(super::load(path)?)))
    }

    pub fn tree(&self) -> &Arc<XmlTree> {
        &self.tree
    }

    pub fn entry(&self) -> Entry {
        Entry::new(Arc::new(self.clone()), Path::new())
    }

    fn rooted(&self, root: ElementId, vars: Map<String, Value>) -> Self {
        Self {
            tree: self.tree.clone(),
            root,
            vars,
        }
    }

    fn matches(&self, path: &[Segment]) -> (Vec<ElementId>, Map<String, Value>) {
        let selection = select(&self.tree, self.root, path, &self.vars);
        (selection.elements, selection.vars)
    }
}

impl Backend for XmlBackend {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn fetch(&self, path: &[Segment], lazy: bool) -> Result<Vec<Resolved>> {
        let (elements, vars) = self.matches(path);
        elements
            .into_iter()
            .map(|id| {
                let element = self.tree.element(id);
                if is_leaf(element) {
                    decode_leaf(element, &vars).map(Resolved::Value)
                } else if lazy {
                    let backend = self.rooted(id, vars.clone());
                    Ok(Resolved::Entry(Entry::new(Arc::new(backend), Path::new())))
                } else {
                    to_value(&self.tree, id, &vars).map(Resolved::Value)
                }
            })
            .collect()
    }

    fn children(&self, path: &[Segment]) -> Result<Vec<Segment>> {
        let (elements, _) = self.matches(path);
        match elements.as_slice() {
            [] => Err(Error::NotFound(Path::from(path).to_string())),
            [one] => Ok(self
                .tree
                .child_tags(*one)
                .into_iter()
                .map(Segment::key)
                .collect()),
            many => Ok((0..many.len()).map(Segment::position).collect()),
        }
    }

    fn kind(&self, path: &[Segment]) -> Result<Kind> {
        let (elements, vars) = self.matches(path);
        match elements.as_slice() {
            [] => Err(Error::NotFound(Path::from(path).to_string())),
            [one] => {
                let element = self.tree.element(*one);
                if !is_leaf(element) {
                    return Ok(Kind::Mapping);
                }
                Ok(match decode_leaf(element, &vars)? {
                    Value::Null => Kind::Empty,
                    Value::Array(_) => Kind::Sequence,
                    _ => Kind::Scalar,
                })
            }
            _ => Ok(Kind::Sequence),
        }
    }
}
