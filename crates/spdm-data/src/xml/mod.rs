//! XML documents as lazy trees.
//!
//! Files are parsed with quick-xml into an arena ([`XmlTree`]). `xi:include`
//! elements are replaced by the root of the referenced file, and several
//! files can be layered as configuration overlays.

mod decode;
mod entry;
mod query;

use std::fs;
use std::path::Path as FsPath;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{Error, Result};

pub use decode::{decode_leaf, is_leaf, to_value};
pub use entry::XmlBackend;
pub use query::{select, Selection};

pub const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";

const MAX_INCLUDE_DEPTH: usize = 32;

/// Index of an element inside its [`XmlTree`].
pub type ElementId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: IndexMap<String, String>,
    /// Trimmed text before the first child element.
    pub text: Option<String>,
    pub children: Vec<ElementId>,
    include: bool,
}

impl Element {
    fn new(tag: String) -> Self {
        Self {
            tag,
            attrs: IndexMap::new(),
            text: None,
            children: Vec::new(),
            include: false,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }
}

/// Arena-allocated XML element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlTree {
    elements: Vec<Element>,
    root: ElementId,
}

impl XmlTree {
    /// Parse a document. Includes are left in place; see [`load_str`].
    pub fn parse(src: &str) -> Result<Self> {
        let mut reader = Reader::from_str(src);
        let mut elements: Vec<Element> = Vec::new();
        let mut root = None;
        let mut stack: Vec<ElementId> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        let mut namespaces: Vec<Vec<(String, String)>> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(start) => {
                    let (element, decls) = open_element(&start, &namespaces)?;
                    let id = attach(&mut elements, &mut root, &stack, element)?;
                    stack.push(id);
                    texts.push(String::new());
                    namespaces.push(decls);
                }
                Event::Empty(start) => {
                    let (element, _) = open_element(&start, &namespaces)?;
                    attach(&mut elements, &mut root, &stack, element)?;
                }
                Event::End(_) => {
                    if let (Some(id), Some(text)) = (stack.pop(), texts.pop()) {
                        let text = text.trim();
                        elements[id].text = (!text.is_empty()).then(|| text.to_string());
                        namespaces.pop();
                    }
                }
                Event::Text(t) => {
                    if let (Some(&top), Some(buf)) = (stack.last(), texts.last_mut()) {
                        if elements[top].children.is_empty() {
                            buf.push_str(&t.unescape()?);
                        }
                    }
                }
                Event::CData(c) => {
                    if let (Some(&top), Some(buf)) = (stack.last(), texts.last_mut()) {
                        if elements[top].children.is_empty() {
                            buf.push_str(&String::from_utf8_lossy(&c));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        let root = root.ok_or_else(|| Error::Parse("document has no root element".to_string()))?;
        Ok(Self { elements, root })
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id]
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn children(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        self.elements[id].children.iter().copied()
    }

    pub fn children_by_tag<'a>(
        &'a self,
        id: ElementId,
        tag: &'a str,
    ) -> impl Iterator<Item = ElementId> + 'a {
        self.children(id).filter(move |&c| self.elements[c].tag == tag)
    }

    /// Distinct child tags in document order.
    pub fn child_tags(&self, id: ElementId) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for c in self.children(id) {
            let tag = self.elements[c].tag.as_str();
            if !out.contains(&tag) {
                out.push(tag);
            }
        }
        out
    }

    /// Copy the subtree of `other` rooted at `source` into this arena.
    fn graft(&mut self, other: &XmlTree, source: ElementId) -> ElementId {
        let mut element = other.elements[source].clone();
        element.children.clear();
        let id = self.elements.len();
        self.elements.push(element);
        for &child in &other.elements[source].children {
            let copied = self.graft(other, child);
            self.elements[id].children.push(copied);
        }
        id
    }

    /// Replace every include element by the root of the tree `load` returns
    /// for its `href`.
    fn resolve_includes<F>(&mut self, mut load: F) -> Result<()>
    where
        F: FnMut(&str) -> Result<XmlTree>,
    {
        let mut stack = vec![self.root];
        while let Some(parent) = stack.pop() {
            for pos in 0..self.elements[parent].children.len() {
                let child = self.elements[parent].children[pos];
                if !self.elements[child].include {
                    stack.push(child);
                    continue;
                }
                let href = self.elements[child]
                    .attr("href")
                    .ok_or_else(|| Error::Parse("xi:include without href".to_string()))?
                    .to_string();
                let included = load(&href)?;
                let grafted = self.graft(&included, included.root);
                self.elements[parent].children[pos] = grafted;
            }
        }
        Ok(())
    }

    /// Layer `overlay` on top of this tree.
    ///
    /// Children are matched on `(tag, id)`; a child without an id matches the
    /// first sibling with the same tag. Matched elements take the overlay's
    /// attributes and text and merge recursively; unmatched ones are appended.
    pub fn merge(&mut self, overlay: &XmlTree) -> Result<()> {
        self.merge_element(self.root, overlay, overlay.root)
    }

    fn merge_element(&mut self, target: ElementId, other: &XmlTree, source: ElementId) -> Result<()> {
        let src = &other.elements[source];
        if self.elements[target].tag != src.tag {
            return Err(Error::TypeConflict(format!(
                "cannot merge <{}> into <{}>",
                src.tag, self.elements[target].tag
            )));
        }
        for (k, v) in &src.attrs {
            self.elements[target].attrs.insert(k.clone(), v.clone());
        }
        if src.text.is_some() {
            self.elements[target].text = src.text.clone();
        }
        for &child in &src.children {
            let c = &other.elements[child];
            let matched = self.elements[target].children.iter().copied().find(|&t| {
                let e = &self.elements[t];
                e.tag == c.tag && (c.id().is_none() || e.id() == c.id())
            });
            match matched {
                Some(t) => self.merge_element(t, other, child)?,
                None => {
                    let copied = self.graft(other, child);
                    self.elements[target].children.push(copied);
                }
            }
        }
        Ok(())
    }
}

fn open_element(
    start: &BytesStart<'_>,
    namespaces: &[Vec<(String, String)>],
) -> Result<(Element, Vec<(String, String)>)> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| Error::Parse(e.to_string()))?
        .to_string();
    let mut element = Element::new(tag);
    let mut decls = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Parse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| Error::Parse(e.to_string()))?
            .to_string();
        let value = attr.unescape_value()?.into_owned();
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            decls.push((prefix.to_string(), value));
            continue;
        }
        element.attrs.insert(key, value);
    }
    element.include = is_include(&element.tag, &decls, namespaces);
    Ok((element, decls))
}

fn is_include(tag: &str, own: &[(String, String)], outer: &[Vec<(String, String)>]) -> bool {
    let Some((prefix, local)) = tag.split_once(':') else {
        return false;
    };
    if local != "include" {
        return false;
    }
    let uri = own
        .iter()
        .chain(outer.iter().rev().flatten())
        .find(|(p, _)| p == prefix)
        .map(|(_, uri)| uri.as_str());
    match uri {
        Some(uri) => uri == XINCLUDE_NS,
        None => prefix == "xi",
    }
}

fn attach(
    elements: &mut Vec<Element>,
    root: &mut Option<ElementId>,
    stack: &[ElementId],
    element: Element,
) -> Result<ElementId> {
    let id = elements.len();
    match stack.last() {
        Some(&parent) => elements[parent].children.push(id),
        None if root.is_none() => *root = Some(id),
        None => return Err(Error::Parse("more than one root element".to_string())),
    }
    elements.push(element);
    Ok(id)
}

/// Options for [`load_with`] and [`load_str_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Replace `xi:include` elements by the referenced documents.
    pub resolve_includes: bool,
    pub max_include_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            resolve_includes: true,
            max_include_depth: MAX_INCLUDE_DEPTH,
        }
    }
}

/// Parse `src`, resolving includes relative to `base_dir`.
pub fn load_str(src: &str, base_dir: &FsPath) -> Result<XmlTree> {
    load_str_with(src, base_dir, &LoadOptions::default())
}

pub fn load_str_with(src: &str, base_dir: &FsPath, options: &LoadOptions) -> Result<XmlTree> {
    load_str_at(src, base_dir, options, 0)
}

fn load_str_at(src: &str, base_dir: &FsPath, options: &LoadOptions, depth: usize) -> Result<XmlTree> {
    let mut tree = XmlTree::parse(src)?;
    if options.resolve_includes {
        tree.resolve_includes(|href| load_at(&base_dir.join(href), options, depth + 1))?;
    }
    Ok(tree)
}

/// Load a file, resolving includes relative to it.
pub fn load(path: impl AsRef<FsPath>) -> Result<XmlTree> {
    load_with(path, &LoadOptions::default())
}

pub fn load_with(path: impl AsRef<FsPath>, options: &LoadOptions) -> Result<XmlTree> {
    load_at(path.as_ref(), options, 0)
}

fn load_at(path: &FsPath, options: &LoadOptions, depth: usize) -> Result<XmlTree> {
    if depth > options.max_include_depth {
        return Err(Error::Parse(format!(
            "includes nested deeper than {} at {}",
            options.max_include_depth,
            path.display()
        )));
    }
    let src = fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
    let base = path.parent().unwrap_or_else(|| FsPath::new("."));
    let tree = load_str_at(&src, base, options, depth).map_err(|e| match e {
        Error::Parse(msg) => Error::Parse(format!("{}: {msg}", path.display())),
        other => other,
    })?;
    debug!(path = %path.display(), elements = tree.len(), "loaded xml");
    Ok(tree)
}

/// Load several files and layer each one over the previous.
pub fn load_overlay<P: AsRef<FsPath>>(paths: &[P]) -> Result<XmlTree> {
    let mut iter = paths.iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::InvalidValue("no xml file given".to_string()))?;
    let mut tree = load(first)?;
    for path in iter {
        tree.merge(&load(path)?)?;
    }
    Ok(tree)
}
