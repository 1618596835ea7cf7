//! Documents and collections of documents.
//!
//! A [`Document`] is one openable data source that hands out an [`Entry`].
//! A [`Collection`] finds or creates documents from predicate fields, such as
//! a directory of `shot_{shot}.json` files or an in-memory list.

use std::fmt;
use std::fs;
use std::path::{Path as FsPath, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use regex::Regex;
use serde_json::{Map, Value};
use spdm_path::parse_path;
use spdm_util::{format_with, placeholders, CachedProperty};
use tracing::{debug, info};

use crate::descriptor::Descriptor;
use crate::entry::{Entry, MemoryBackend};
use crate::error::{Error, Result};
use crate::geqdsk::Geqdsk;
use crate::plugin::Registry;
use crate::xml::{load_overlay, XmlBackend, XmlTree};

// ── Mode ──────────────────────────────────────────────────────────────────

/// How a document is opened, parsed from `r`, `w`, `x`, `a` and `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mode {
    pub read: bool,
    /// Start from an empty document.
    pub write: bool,
    /// The document must not exist yet.
    pub create: bool,
    /// Keep existing content and allow writes.
    pub append: bool,
}

impl Mode {
    pub const READ: Mode = Mode {
        read: true,
        write: false,
        create: false,
        append: false,
    };

    pub fn is_writable(&self) -> bool {
        self.write || self.create || self.append
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::READ
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut mode = Mode {
            read: false,
            write: false,
            create: false,
            append: false,
        };
        for c in s.chars() {
            match c {
                'r' => mode.read = true,
                'w' => mode.write = true,
                'x' => mode.create = true,
                'a' => mode.append = true,
                '+' => {
                    mode.read = true;
                    mode.append = true;
                }
                _ => return Err(Error::InvalidValue(format!("bad open mode `{s}`"))),
            }
        }
        if s.is_empty() {
            return Err(Error::InvalidValue("empty open mode".to_string()));
        }
        Ok(mode)
    }
}

// ── Traits ────────────────────────────────────────────────────────────────

pub trait Connection {
    fn open(&self, mode: Mode) -> Result<()>;
    fn close(&self) -> Result<()>;
    fn is_open(&self) -> bool;
}

pub trait Document: Connection + Send + Sync + fmt::Debug {
    /// Backing file, if any.
    fn path(&self) -> Option<&FsPath> {
        None
    }

    fn entry(&self) -> Result<Entry>;

    /// Persist pending writes.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub trait Collection: Send + Sync + fmt::Debug {
    /// The first document matching every predicate field.
    fn find_one(&self, predicate: &Map<String, Value>) -> Result<Arc<dyn Document>>;

    /// A new document identified by the predicate.
    fn insert_one(&self, predicate: &Map<String, Value>) -> Result<Arc<dyn Document>>;

    fn count(&self, predicate: &Map<String, Value>) -> Result<usize>;

    /// Find (or, for writable modes with no match, insert) a document and
    /// open it.
    fn open(&self, predicate: &Map<String, Value>, mode: Mode) -> Result<Arc<dyn Document>> {
        let doc = if mode.create || (mode.is_writable() && self.count(predicate)? == 0) {
            self.insert_one(predicate)?
        } else {
            self.find_one(predicate)?
        };
        doc.open(mode)?;
        Ok(doc)
    }
}

#[derive(Debug, Default)]
struct OpenState(Mutex<Option<Mode>>);

impl OpenState {
    fn set(&self, mode: Option<Mode>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = mode;
    }

    fn get(&self) -> Option<Mode> {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mode(&self) -> Mode {
        self.get().unwrap_or_default()
    }
}

fn read_only(mode: Mode, what: &str, path: &FsPath) -> Result<()> {
    if mode.is_writable() {
        return Err(Error::ReadOnly(format!("{what} document {}", path.display())));
    }
    Ok(())
}

// ── Documents ─────────────────────────────────────────────────────────────

/// XML file, or several layered as overlays. Parsed once, on first access.
#[derive(Debug)]
pub struct XmlDocument {
    paths: Vec<PathBuf>,
    tree: CachedProperty<Arc<XmlTree>>,
    state: OpenState,
}

impl XmlDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::overlay(vec![path.into()])
    }

    pub fn overlay(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            tree: CachedProperty::new(),
            state: OpenState::default(),
        }
    }

    pub fn tree(&self) -> Result<&Arc<XmlTree>> {
        self.tree
            .get_or_try_init(|| load_overlay(&self.paths).map(Arc::new))
    }
}

impl Connection for XmlDocument {
    fn open(&self, mode: Mode) -> Result<()> {
        let path = self.paths.first().map(PathBuf::as_path).unwrap_or(FsPath::new(""));
        read_only(mode, "xml", path)?;
        self.state.set(Some(mode));
        info!(path = %path.display(), files = self.paths.len(), "opened xml document");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.state.set(None);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.get().is_some()
    }
}

impl Document for XmlDocument {
    fn path(&self) -> Option<&FsPath> {
        self.paths.first().map(PathBuf::as_path)
    }

    fn entry(&self) -> Result<Entry> {
        Ok(XmlBackend::new(self.tree()?.clone()).entry())
    }
}

/// JSON file held in a memory backend and written back on `flush`.
#[derive(Debug)]
pub struct JsonDocument {
    path: PathBuf,
    backend: CachedProperty<MemoryBackend>,
    state: OpenState,
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backend: CachedProperty::new(),
            state: OpenState::default(),
        }
    }

    fn backend(&self) -> Result<&MemoryBackend> {
        self.backend.get_or_try_init(|| {
            let mode = self.state.mode();
            if mode.write || (mode.is_writable() && !self.path.exists()) {
                return Ok(MemoryBackend::default());
            }
            let src = fs::read_to_string(&self.path)
                .map_err(|e| Error::Io(format!("{}: {e}", self.path.display())))?;
            let backend = MemoryBackend::new(serde_json::from_str::<Value>(&src)?);
            debug!(path = %self.path.display(), "loaded json");
            Ok(if mode.is_writable() {
                backend
            } else {
                backend.read_only()
            })
        })
    }
}

impl Connection for JsonDocument {
    fn open(&self, mode: Mode) -> Result<()> {
        if mode.create && self.path.exists() {
            return Err(Error::InvalidValue(format!(
                "{} already exists",
                self.path.display()
            )));
        }
        self.state.set(Some(mode));
        info!(path = %self.path.display(), ?mode, "opened json document");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.flush()?;
        self.state.set(None);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.get().is_some()
    }
}

impl Document for JsonDocument {
    fn path(&self) -> Option<&FsPath> {
        Some(&self.path)
    }

    fn entry(&self) -> Result<Entry> {
        Ok(self.backend()?.entry())
    }

    fn flush(&self) -> Result<()> {
        if !self.state.mode().is_writable() {
            return Ok(());
        }
        let Some(backend) = self.backend.get() else {
            return Ok(());
        };
        let value = backend.snapshot().serialize()?;
        fs::write(&self.path, serde_json::to_string_pretty(&value)?)?;
        debug!(path = %self.path.display(), "flushed json");
        Ok(())
    }
}

/// G-EQDSK file, decoded into a read-only memory tree.
#[derive(Debug)]
pub struct GeqdskDocument {
    path: PathBuf,
    backend: CachedProperty<MemoryBackend>,
    state: OpenState,
}

impl GeqdskDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backend: CachedProperty::new(),
            state: OpenState::default(),
        }
    }
}

impl Connection for GeqdskDocument {
    fn open(&self, mode: Mode) -> Result<()> {
        read_only(mode, "geqdsk", &self.path)?;
        self.state.set(Some(mode));
        info!(path = %self.path.display(), "opened geqdsk document");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.state.set(None);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.get().is_some()
    }
}

impl Document for GeqdskDocument {
    fn path(&self) -> Option<&FsPath> {
        Some(&self.path)
    }

    fn entry(&self) -> Result<Entry> {
        let backend = self.backend.get_or_try_init(|| {
            let value = Geqdsk::read(&self.path)?.to_value()?;
            Ok::<_, Error>(MemoryBackend::new(value).read_only())
        })?;
        Ok(backend.entry())
    }
}

/// A document living only in memory.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    backend: MemoryBackend,
    state: OpenState,
}

impl MemoryDocument {
    pub fn new(value: Value) -> Self {
        Self {
            backend: MemoryBackend::new(value),
            state: OpenState::default(),
        }
    }

    fn matches(&self, predicate: &Map<String, Value>) -> bool {
        let root = self.backend.snapshot();
        predicate.iter().all(|(key, expected)| {
            root.get(parse_path(key))
                .and_then(|n| n.serialize())
                .is_ok_and(|v| &v == expected)
        })
    }
}

impl Connection for MemoryDocument {
    fn open(&self, mode: Mode) -> Result<()> {
        self.state.set(Some(mode));
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.state.set(None);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.get().is_some()
    }
}

impl Document for MemoryDocument {
    fn entry(&self) -> Result<Entry> {
        Ok(self.backend.entry())
    }
}

/// Documents by class: `file.XML`, `file.JSON`, `file.GEQdsk`. Each needs a
/// `path`.
pub fn document_registry() -> Registry<Arc<dyn Document>> {
    let mut registry = Registry::new("document").with_default_associations();
    registry.register_class("file.XML", |d: &Descriptor| {
        Ok(Arc::new(XmlDocument::new(required_path(d)?)) as Arc<dyn Document>)
    });
    registry.register_class("file.JSON", |d: &Descriptor| {
        Ok(Arc::new(JsonDocument::new(required_path(d)?)) as Arc<dyn Document>)
    });
    registry.register_class("file.GEQdsk", |d: &Descriptor| {
        Ok(Arc::new(GeqdskDocument::new(required_path(d)?)) as Arc<dyn Document>)
    });
    registry
}

fn required_path(d: &Descriptor) -> Result<PathBuf> {
    d.path
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| Error::InvalidValue(format!("descriptor {:?} has no path", d.hint())))
}

/// Open the document at `path`, picking its class from the suffix.
pub fn open_document(path: impl AsRef<FsPath>) -> Result<Arc<dyn Document>> {
    document_registry().create(&Descriptor::from_path(path))
}

// ── Collections ───────────────────────────────────────────────────────────

/// In-memory documents matched on their content.
#[derive(Debug, Default)]
pub struct MappingCollection {
    docs: RwLock<Vec<Arc<MemoryDocument>>>,
    next_id: AtomicU64,
}

impl MappingCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document as is.
    pub fn push(&self, value: Value) -> Arc<dyn Document> {
        let doc = Arc::new(MemoryDocument::new(value));
        self.docs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(doc.clone());
        doc
    }

    fn matching(&self, predicate: &Map<String, Value>) -> Vec<Arc<MemoryDocument>> {
        self.docs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| d.matches(predicate))
            .cloned()
            .collect()
    }
}

impl Collection for MappingCollection {
    fn find_one(&self, predicate: &Map<String, Value>) -> Result<Arc<dyn Document>> {
        match self.matching(predicate).into_iter().next() {
            Some(doc) => Ok(doc),
            None => Err(Error::NotFound(format!(
                "no document matches {}",
                Value::Object(predicate.clone())
            ))),
        }
    }

    fn insert_one(&self, predicate: &Map<String, Value>) -> Result<Arc<dyn Document>> {
        let mut content = predicate.clone();
        if !content.contains_key("_id") {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            content.insert("_id".to_string(), Value::from(id));
        }
        Ok(self.push(Value::Object(content)))
    }

    fn count(&self, predicate: &Map<String, Value>) -> Result<usize> {
        Ok(self.matching(predicate).len())
    }
}

/// Files in one directory named by a template such as `shot_{shot}.json`.
#[derive(Debug, Clone)]
pub struct LocalFileCollection {
    dir: PathBuf,
    template: String,
    auto_increment: bool,
}

impl LocalFileCollection {
    pub fn new(dir: impl Into<PathBuf>, template: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            template: template.into(),
            auto_increment: false,
        }
    }

    /// Split `dir/template` into its directory and file name template.
    pub fn from_pattern(pattern: &str) -> Self {
        let pattern = FsPath::new(pattern);
        let dir = pattern.parent().map(FsPath::to_path_buf).unwrap_or_default();
        let template = pattern
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(dir, template)
    }

    /// Fill a missing `{_id}` with the next free number on insert.
    pub fn auto_increment(mut self, yes: bool) -> Self {
        self.auto_increment = yes;
        self
    }

    /// The file name the predicate identifies.
    pub fn guess_id(&self, predicate: &Map<String, Value>, allow_auto: bool) -> Result<PathBuf> {
        let next = if allow_auto && self.auto_increment {
            Some(self.next_id(predicate)?)
        } else {
            None
        };
        let mut missing = Vec::new();
        let name = format_with(&self.template, |key| match predicate.get(key) {
            Some(v) => Some(text_of(v)),
            None if key == "_id" && next.is_some() => next.map(|n| n.to_string()),
            None => {
                missing.push(key.to_string());
                None
            }
        });
        if !missing.is_empty() {
            return Err(Error::InvalidValue(format!(
                "cannot fill `{}`: missing {}",
                self.template,
                missing.join(", ")
            )));
        }
        Ok(self.dir.join(name))
    }

    /// Existing files matching the predicate, with the template fields
    /// their names bind, in name order.
    fn existing(&self, predicate: &Map<String, Value>) -> Result<Vec<(PathBuf, Map<String, Value>)>> {
        let (regex, free) = self.name_regex(predicate)?;
        let read = match fs::read_dir(&self.dir) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for item in read {
            let item = item?;
            let name = item.file_name().to_string_lossy().into_owned();
            let Some(caps) = regex.captures(&name) else {
                continue;
            };
            let bound: Map<String, Value> = free
                .iter()
                .enumerate()
                .filter_map(|(i, key)| {
                    let m = caps.get(i + 1)?;
                    Some((key.clone(), Value::String(m.as_str().to_string())))
                })
                .collect();
            out.push((item.path(), bound));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn name_regex(&self, predicate: &Map<String, Value>) -> Result<(Regex, Vec<String>)> {
        let mut free = Vec::new();
        let mut pattern = String::from("^");
        let mut rest = self.template.as_str();
        for key in placeholders(&self.template) {
            let token = format!("{{{key}}}");
            let Some(at) = rest.find(&token) else {
                continue;
            };
            pattern.push_str(&regex::escape(&rest[..at]));
            match predicate.get(&key) {
                Some(v) => pattern.push_str(&regex::escape(&text_of(v))),
                None => {
                    pattern.push_str("(.+?)");
                    free.push(key);
                }
            }
            rest = &rest[at + token.len()..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');
        let regex = Regex::new(&pattern).map_err(|e| Error::InvalidValue(e.to_string()))?;
        Ok((regex, free))
    }

    fn next_id(&self, predicate: &Map<String, Value>) -> Result<u64> {
        let mut open = predicate.clone();
        open.remove("_id");
        let max = self
            .existing(&open)?
            .iter()
            .filter_map(|(_, bound)| bound.get("_id")?.as_str()?.parse::<u64>().ok())
            .max();
        Ok(max.map_or(0, |m| m + 1))
    }
}

impl Collection for LocalFileCollection {
    fn find_one(&self, predicate: &Map<String, Value>) -> Result<Arc<dyn Document>> {
        match self.existing(predicate)?.into_iter().next() {
            Some((path, _)) => open_document(path),
            None => Err(Error::NotFound(format!(
                "no file in {} matches `{}` for {}",
                self.dir.display(),
                self.template,
                Value::Object(predicate.clone())
            ))),
        }
    }

    fn insert_one(&self, predicate: &Map<String, Value>) -> Result<Arc<dyn Document>> {
        let path = self.guess_id(predicate, true)?;
        debug!(path = %path.display(), "new document");
        open_document(path)
    }

    fn count(&self, predicate: &Map<String, Value>) -> Result<usize> {
        Ok(self.existing(predicate)?.len())
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collections by class: `db.Mapping`, `db.LocalFile`.
pub fn collection_registry() -> Registry<Arc<dyn Collection>> {
    let mut registry = Registry::new("collection").with_default_associations();
    registry.register_factory("db.Mapping", || {
        Ok(Arc::new(MappingCollection::new()) as Arc<dyn Collection>)
    });
    registry.register_class("db.LocalFile", |d: &Descriptor| {
        let pattern = required_path(d)?;
        let auto = d
            .query
            .get("auto_increment")
            .or_else(|| d.field("auto_increment"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Arc::new(
            LocalFileCollection::from_pattern(&pattern.to_string_lossy()).auto_increment(auto),
        ) as Arc<dyn Collection>)
    });
    registry
}

/// Open a URI or file path for reading and return its root entry.
///
/// A scheme naming a collection picks the document from the fragment fields
/// (`local:///data/shot_{shot}.json#shot=900`); so does a path holding a
/// `{field}` template. Anything else opens a document by scheme or suffix.
pub fn open_entry(uri: &str) -> Result<Entry> {
    let desc = Descriptor::parse(uri)?;

    if desc.scheme.is_some() {
        match collection_registry().create(&desc) {
            Ok(collection) => return collection.open(&desc.fragment, Mode::READ)?.entry(),
            Err(Error::PluginNotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }

    if let Some(pattern) = desc.path.as_deref().filter(|p| p.contains('{')) {
        let collection = LocalFileCollection::from_pattern(pattern);
        return collection.open(&desc.fragment, Mode::READ)?.entry();
    }

    let doc = document_registry().create(&desc)?;
    doc.open(Mode::READ)?;
    doc.entry()
}
