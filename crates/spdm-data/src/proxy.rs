//! Mapping proxy: a mapping XML tree in front of another entry.
//!
//! Paths are looked up in the mapping first. A `dtype="ref"` element
//! redirects to the path in its text (`/` or `.` separated) on the target.
//! Other leaves are fixed values. Paths the mapping does not know go to
//! the target unchanged.

use std::sync::Arc;

use serde_json::{Map, Value};
use spdm_path::{parse_path, Path, Segment};
use tracing::warn;

use crate::entry::{Backend, Entry, Resolved};
use crate::error::{Error, Result};
use crate::node::Kind;
use crate::xml::{decode_leaf, is_leaf, select, ElementId, XmlTree};

#[derive(Debug, Clone)]
pub struct ProxyBackend {
    mapping: Arc<XmlTree>,
    root: ElementId,
    /// Path of `root` from the top of the mapping.
    base: Path,
    target: Entry,
}

enum Route {
    Target(Path),
    Fixed(Value),
    Mapped(ElementId),
    Many(Vec<Path>),
}

impl ProxyBackend {
    pub fn new(mapping: Arc<XmlTree>, target: Entry) -> Self {
        let root = mapping.root();
        Self {
            mapping,
            root,
            base: Path::new(),
            target,
        }
    }

    pub fn entry(&self) -> Entry {
        Entry::new(Arc::new(self.clone()), Path::new())
    }

    fn rooted(&self, root: ElementId, base: Path) -> Self {
        Self {
            mapping: self.mapping.clone(),
            root,
            base,
            target: self.target.clone(),
        }
    }

    fn route(&self, path: &[Segment]) -> Result<Route> {
        for i in 0..=path.len() {
            let selection = select(&self.mapping, self.root, &path[..i], &Map::new());
            match selection.elements.as_slice() {
                [] => return Ok(Route::Target(self.base.join(path))),
                [one] => {
                    let element = self.mapping.element(*one);
                    if element.attr("dtype") == Some("ref") {
                        let target = ref_path(element.text.as_deref().unwrap_or_default());
                        return Ok(Route::Target(target.join(&path[i..])));
                    }
                    if i == path.len() {
                        if is_leaf(element) {
                            return Ok(Route::Fixed(decode_leaf(element, &selection.vars)?));
                        }
                        return Ok(Route::Mapped(*one));
                    }
                }
                many if i == path.len() => {
                    let paths = (0..many.len())
                        .map(|k| self.base.join(path).child(Segment::position(k)))
                        .collect();
                    return Ok(Route::Many(paths));
                }
                _ => {}
            }
        }
        Ok(Route::Target(self.base.join(path)))
    }

    fn target_fetch(&self, path: &Path, lazy: bool) -> Result<Vec<Resolved>> {
        self.target.child(path).fetch_all(lazy)
    }

    fn mapped_value(&self, id: ElementId, path: &[Segment]) -> Result<Value> {
        let mut out = Map::new();
        for tag in self.mapping.child_tags(id) {
            let child = Path::from(path).child(Segment::key(tag));
            let mut found = self.fetch(&child, false)?;
            let value = match found.len() {
                0 => continue,
                1 => found.remove(0).into_value()?,
                _ => Resolved::List(found).into_value()?,
            };
            out.insert(tag.to_string(), value);
        }
        Ok(Value::Object(out))
    }
}

fn ref_path(text: &str) -> Path {
    parse_path(&text.trim().trim_start_matches('/').replace('/', "."))
}

impl Backend for ProxyBackend {
    fn name(&self) -> &'static str {
        "proxy"
    }

    fn fetch(&self, path: &[Segment], lazy: bool) -> Result<Vec<Resolved>> {
        match self.route(path)? {
            Route::Target(p) => self.target_fetch(&p, lazy),
            Route::Fixed(v) => Ok(vec![Resolved::Value(v)]),
            Route::Mapped(id) if lazy => {
                let backend = self.rooted(id, self.base.join(path));
                Ok(vec![Resolved::Entry(Entry::new(Arc::new(backend), Path::new()))])
            }
            Route::Mapped(id) => Ok(vec![Resolved::Value(self.mapped_value(id, path)?)]),
            Route::Many(paths) => paths
                .iter()
                .map(|p| {
                    let mut found = self.target_fetch(p, lazy)?;
                    Ok(match found.len() {
                        1 => found.remove(0),
                        _ => Resolved::List(found),
                    })
                })
                .collect(),
        }
    }

    fn children(&self, path: &[Segment]) -> Result<Vec<Segment>> {
        match self.route(path)? {
            Route::Target(p) => self.target.children(p),
            Route::Fixed(_) => Ok(Vec::new()),
            Route::Mapped(id) => Ok(self
                .mapping
                .child_tags(id)
                .into_iter()
                .map(Segment::key)
                .collect()),
            Route::Many(paths) => Ok((0..paths.len()).map(Segment::position).collect()),
        }
    }

    fn kind(&self, path: &[Segment]) -> Result<Kind> {
        match self.route(path)? {
            Route::Target(p) => self.target.child(p).kind(),
            Route::Fixed(Value::Null) => Ok(Kind::Empty),
            Route::Fixed(Value::Array(_)) | Route::Many(_) => Ok(Kind::Sequence),
            Route::Fixed(Value::Object(_)) | Route::Mapped(_) => Ok(Kind::Mapping),
            Route::Fixed(_) => Ok(Kind::Scalar),
        }
    }

    fn is_writable(&self) -> bool {
        self.target.is_writable()
    }

    fn put(&self, path: &[Segment], value: Value) -> Result<()> {
        match self.route(path)? {
            Route::Target(p) => self.target.put(p, value),
            Route::Fixed(_) => {
                warn!(path = %Path::from(path), "fixed value is not changeable");
                Ok(())
            }
            Route::Mapped(_) | Route::Many(_) => Err(Error::TypeConflict(format!(
                "`{}` is a mapped subtree",
                Path::from(path)
            ))),
        }
    }

    fn remove(&self, path: &[Segment]) -> Result<()> {
        match self.route(path)? {
            Route::Target(p) => self.target.remove(p),
            Route::Fixed(_) => {
                warn!(path = %Path::from(path), "fixed value is not changeable");
                Ok(())
            }
            Route::Mapped(_) | Route::Many(_) => Err(Error::TypeConflict(format!(
                "`{}` is a mapped subtree",
                Path::from(path)
            ))),
        }
    }
}
