//! Name → constructor resolution.
//!
//! A [`Registry`] maps canonical dotted class names (`file.XML`,
//! `db.LocalFile`) to constructors. Schemes, file suffixes and short names
//! reach a canonical name through the association table; the last component
//! is also tried in a few spellings so `file.geqdsk` finds `file.GEQdsk`.

use std::fmt;
use std::fs;
use std::path::Path as FsPath;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};

/// Built-in scheme / suffix associations.
pub const DEFAULT_ASSOCIATIONS: &[(&str, &str)] = &[
    ("mapping", "db.Mapping"),
    ("memory", "db.Mapping"),
    ("local", "db.LocalFile"),
    ("xml", "file.XML"),
    ("json", "file.JSON"),
    ("gfile", "file.GEQdsk"),
    ("geqdsk", "file.GEQdsk"),
    ("h5", "file.HDF5"),
    ("hdf5", "file.HDF5"),
    ("nc", "file.NetCDF"),
    ("netcdf", "file.NetCDF"),
    ("mds", "db.MDSplus"),
    ("mdsplus", "db.MDSplus"),
    ("mongo", "db.MongoDB"),
    ("mongodb", "db.MongoDB"),
    ("namelist", "file.NameList"),
    ("nml", "file.NameList"),
    ("yaml", "file.YAML"),
    ("txt", "file.TXT"),
    ("csv", "file.CSV"),
    ("bin", "file.Binary"),
    ("numpy", "file.NumPy"),
    ("proxy", "db.Proxy"),
];

type ClassFn<T> = dyn Fn(&Descriptor) -> Result<T> + Send + Sync;
type FactoryFn<T> = dyn Fn() -> Result<T> + Send + Sync;

pub enum Constructor<T> {
    /// Receives the descriptor with its free fields.
    Class(Arc<ClassFn<T>>),
    /// Called without arguments.
    Factory(Arc<FactoryFn<T>>),
}

impl<T> Clone for Constructor<T> {
    fn clone(&self) -> Self {
        match self {
            Constructor::Class(f) => Constructor::Class(f.clone()),
            Constructor::Factory(f) => Constructor::Factory(f.clone()),
        }
    }
}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constructor::Class(_) => f.write_str("Class"),
            Constructor::Factory(_) => f.write_str("Factory"),
        }
    }
}

impl<T> Constructor<T> {
    pub fn call(&self, descriptor: &Descriptor) -> Result<T> {
        match self {
            Constructor::Class(f) => f(descriptor),
            Constructor::Factory(f) => f(),
        }
    }
}

/// Association overrides, usually read from a JSON file.
///
/// ```json
/// { "associations": { "efit": "file.GEQdsk" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub associations: IndexMap<String, String>,
}

impl ResolverConfig {
    pub fn from_json(src: &str) -> Result<Self> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn load(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let src = fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&src)
    }
}

pub struct Registry<T> {
    kind: &'static str,
    associations: IndexMap<String, String>,
    constructors: IndexMap<String, Constructor<T>>,
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("associations", &self.associations.len())
            .field("constructors", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            associations: self.associations.clone(),
            constructors: self.constructors.clone(),
        }
    }
}

impl<T> Registry<T> {
    /// An empty registry. `kind` names it in log records.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            associations: IndexMap::new(),
            constructors: IndexMap::new(),
        }
    }

    pub fn with_default_associations(mut self) -> Self {
        for (alias, name) in DEFAULT_ASSOCIATIONS {
            self.associate(alias, name);
        }
        self
    }

    pub fn associate(&mut self, alias: &str, canonical: &str) {
        self.associations
            .insert(alias.to_lowercase(), canonical.to_string());
    }

    pub fn apply_config(&mut self, config: &ResolverConfig) {
        for (alias, name) in &config.associations {
            self.associate(alias, name);
        }
    }

    pub fn register(&mut self, name: &str, constructor: Constructor<T>) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn register_class<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&Descriptor) -> Result<T> + Send + Sync + 'static,
    {
        self.register(name, Constructor::Class(Arc::new(f)));
    }

    pub fn register_factory<F>(&mut self, name: &str, f: F)
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        self.register(name, Constructor::Factory(Arc::new(f)));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve_name(name).is_ok()
    }

    /// The canonical name of the constructor `name` refers to.
    pub fn resolve_name(&self, name: &str) -> Result<String> {
        let normalized = name.trim().replace('/', ".");
        let lower = normalized.to_lowercase();
        let last = lower.rsplit('.').next().unwrap_or(&lower);
        let target = self
            .associations
            .get(&lower)
            .or_else(|| self.associations.get(last))
            .cloned()
            .unwrap_or(normalized);

        if self.constructors.contains_key(&target) {
            return Ok(target);
        }

        let (head, tail) = match target.rsplit_once('.') {
            Some((head, tail)) => (Some(head), tail),
            None => (None, target.as_str()),
        };
        for variant in [capitalize(tail), tail.to_uppercase(), tail.to_lowercase()] {
            let candidate = match head {
                Some(head) => format!("{head}.{variant}"),
                None => variant,
            };
            if self.constructors.contains_key(&candidate) {
                return Ok(candidate);
            }
        }

        self.constructors
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&target))
            .cloned()
            .ok_or_else(|| Error::PluginNotFound(format!("{} `{name}`", self.kind)))
    }

    /// Pick the constructor for a descriptor: `$class`, then `$schema` or the
    /// URI scheme, then the file suffix.
    pub fn resolve(&self, descriptor: &Descriptor) -> Result<(String, Constructor<T>)> {
        let hint = descriptor.hint().ok_or_else(|| {
            Error::PluginNotFound(format!("{} for a descriptor without class hint", self.kind))
        })?;
        let name = self.resolve_name(&hint)?;
        debug!(registry = self.kind, %hint, %name, "resolved");
        let constructor = self
            .constructors
            .get(&name)
            .cloned()
            .ok_or_else(|| Error::PluginNotFound(format!("{} `{name}`", self.kind)))?;
        Ok((name, constructor))
    }

    pub fn create(&self, descriptor: &Descriptor) -> Result<T> {
        let (_, constructor) = self.resolve(descriptor)?;
        constructor.call(descriptor)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
