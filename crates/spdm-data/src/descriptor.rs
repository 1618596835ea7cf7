//! Descriptors: what to construct and from where.
//!
//! A descriptor is a URI (`scheme://authority/path?query#fragment`), a plain
//! file path, a bare scheme name, or a mapping with `$class`, `$schema`,
//! `$ref`, `default` and free fields.

use std::borrow::Cow;
use std::path::Path as FsPath;

use serde_json::{Map, Value};
use spdm_util::{format_value, Envs};
use tracing::debug;
use url::{form_urlencoded, Url};

use crate::collection::{document_registry, Mode};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::plugin::Registry;

/// Field carrying the data handed to [`create_dobject`] into a constructor.
pub const DATA_FIELD: &str = "$data";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Descriptor {
    pub class: Option<String>,
    pub schema: Option<String>,
    pub reference: Option<String>,
    pub default: Option<Value>,
    pub scheme: Option<String>,
    pub authority: Option<String>,
    pub path: Option<String>,
    pub query: Map<String, Value>,
    /// Predicate fields from the URI fragment (`#shot=900&run=1`).
    pub fragment: Map<String, Value>,
    pub fields: Map<String, Value>,
}

impl Descriptor {
    pub fn parse(src: &str) -> Result<Self> {
        let src = src.trim();
        if let Some((scheme, rest)) = src.split_once("://") {
            let url = Url::parse(src)?;
            let rest = rest.split(['?', '#']).next().unwrap_or_default();
            let (authority, path) = match rest.find('/') {
                Some(i) => (&rest[..i], &rest[i..]),
                None => (rest, ""),
            };
            let scheme = scheme.split('+').next().unwrap_or_default().to_lowercase();
            return Ok(Self {
                scheme: match scheme.as_str() {
                    "" | "local" | "file" => None,
                    _ => Some(scheme),
                },
                authority: (!authority.is_empty()).then(|| authority.to_string()),
                path: (!path.is_empty()).then(|| path.to_string()),
                query: fields_from_pairs(url.query_pairs()),
                fragment: url
                    .fragment()
                    .map(|f| fields_from_pairs(form_urlencoded::parse(f.as_bytes())))
                    .unwrap_or_default(),
                ..Self::default()
            });
        }
        if !src.contains(['/', '.']) {
            return Ok(Self {
                scheme: (!src.is_empty()).then(|| src.to_lowercase()),
                ..Self::default()
            });
        }
        Ok(Self::from_path(src))
    }

    pub fn from_path(path: impl AsRef<FsPath>) -> Self {
        Self {
            path: Some(path.as_ref().to_string_lossy().into_owned()),
            ..Self::default()
        }
    }

    /// From a string (see [`Descriptor::parse`]) or a mapping.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::String(s) => return Self::parse(s),
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(Error::InvalidValue(format!(
                    "descriptor must be a string or a mapping, got {other}"
                )))
            }
        };

        let mut out = match map.get("path") {
            Some(Value::String(p)) => Self::parse(p)?,
            _ => Self::default(),
        };
        for (key, value) in map {
            match (key.as_str(), value) {
                ("$class", Value::String(s)) => out.class = Some(s.clone()),
                ("$schema", Value::String(s)) => out.schema = Some(s.clone()),
                ("$ref", Value::String(s)) => out.reference = Some(s.clone()),
                ("default", v) => out.default = Some(v.clone()),
                ("path", Value::String(_)) => {}
                (k, v) => {
                    out.fields.insert(k.to_string(), v.clone());
                }
            }
        }
        Ok(out)
    }

    /// Lower-cased extension of the path.
    pub fn suffix(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        FsPath::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// The first of `$class`, `$schema`, scheme and suffix that is present.
    pub fn hint(&self) -> Option<String> {
        self.class
            .clone()
            .or_else(|| self.schema.clone())
            .or_else(|| self.scheme.clone())
            .or_else(|| self.suffix())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

fn fields_from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Map<String, Value> {
    pairs
        .map(|(k, v)| (k.into_owned(), coerce(&v)))
        .collect()
}

/// Numbers and booleans in query strings become JSON values.
fn coerce(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => v,
        _ => Value::String(text.to_string()),
    }
}

/// Data-object registry: `general` plus one class per document type.
pub fn dobject_registry() -> Registry<Node> {
    let mut registry = Registry::new("dobject").with_default_associations();
    registry.register_class("general", |d: &Descriptor| {
        Ok(d.field(DATA_FIELD)
            .or(d.default.as_ref())
            .cloned()
            .map(Node::deserialize)
            .unwrap_or_default())
    });
    let documents = document_registry();
    for name in documents.names().map(str::to_string).collect::<Vec<_>>() {
        let documents = documents.clone();
        registry.register_class(&name, move |d: &Descriptor| {
            let doc = documents.create(d)?;
            doc.open(Mode::READ)?;
            Ok(Node::from(doc.entry()?))
        });
    }
    registry
}

/// Build a data object from a descriptor.
///
/// The descriptor is template-formatted with `envs` first. Without `data`,
/// `envs[$ref]` and then `default` supply it. A `$class` (or a file `path`
/// when no data is at hand) is constructed through `registry`; otherwise the
/// data is wrapped in a node as is.
pub fn create_dobject(
    descriptor: &Value,
    envs: &Envs,
    data: Option<Node>,
    registry: &Registry<Node>,
) -> Result<Node> {
    let formatted = format_value(descriptor, envs);
    let mut desc = Descriptor::from_value(&formatted)?;

    let data = data
        .or_else(|| {
            desc.reference
                .as_deref()
                .and_then(|r| envs.get(r))
                .cloned()
                .map(Node::deserialize)
        })
        .or_else(|| desc.default.clone().map(Node::deserialize));

    let construct = desc.class.is_some() || (data.is_none() && desc.path.is_some());
    if !construct {
        return Ok(data.unwrap_or_default());
    }
    if let Some(data) = &data {
        desc.fields.insert(DATA_FIELD.to_string(), data.serialize()?);
    }
    debug!(hint = ?desc.hint(), "creating data object");
    registry.create(&desc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_uri() {
        let d = Descriptor::parse("mdsplus+ssh://user@host:8000/east/efit?tree=efit_east#shot=900&time=1.5")
            .unwrap();
        assert_eq!(d.scheme.as_deref(), Some("mdsplus"));
        assert_eq!(d.authority.as_deref(), Some("user@host:8000"));
        assert_eq!(d.path.as_deref(), Some("/east/efit"));
        assert_eq!(d.query.get("tree"), Some(&json!("efit_east")));
        assert_eq!(d.fragment.get("shot"), Some(&json!(900)));
        assert_eq!(d.fragment.get("time"), Some(&json!(1.5)));
        assert_eq!(d.hint().as_deref(), Some("mdsplus"));
    }

    #[test]
    fn test_local_scheme_uses_suffix() {
        let d = Descriptor::parse("file:///tmp/shot_{shot}.JSON").unwrap();
        assert_eq!(d.scheme, None);
        assert_eq!(d.path.as_deref(), Some("/tmp/shot_{shot}.JSON"));
        assert_eq!(d.hint().as_deref(), Some("json"));
    }

    #[test]
    fn test_bare_scheme_and_path() {
        assert_eq!(Descriptor::parse("Mapping").unwrap().scheme.as_deref(), Some("mapping"));
        let d = Descriptor::parse("data/g900.gfile").unwrap();
        assert_eq!(d.scheme, None);
        assert_eq!(d.hint().as_deref(), Some("gfile"));
    }

    #[test]
    fn test_from_mapping() {
        let d = Descriptor::from_value(&json!({
            "$class": "file.GEQdsk",
            "$ref": "equilibrium",
            "default": {"a": 1},
            "path": "/tmp/g.txt",
            "units": "m"
        }))
        .unwrap();
        assert_eq!(d.class.as_deref(), Some("file.GEQdsk"));
        assert_eq!(d.reference.as_deref(), Some("equilibrium"));
        assert_eq!(d.default, Some(json!({"a": 1})));
        assert_eq!(d.path.as_deref(), Some("/tmp/g.txt"));
        assert_eq!(d.fields, json!({"units": "m"}).as_object().cloned().unwrap());
        assert_eq!(d.hint().as_deref(), Some("file.GEQdsk"));
        assert!(matches!(Descriptor::from_value(&json!(3)), Err(Error::InvalidValue(_))));
    }

    #[test]
    fn test_create_from_ref_and_default() {
        let registry = dobject_registry();
        let envs = Envs::from_value(json!({"eq": {"psi": [1, 2]}, "n": 3}));

        let node = create_dobject(&json!({"$ref": "eq"}), &envs, None, &registry).unwrap();
        assert_eq!(node.serialize().unwrap(), json!({"psi": [1, 2]}));

        let node = create_dobject(&json!({"$ref": "nope", "default": 5}), &envs, None, &registry)
            .unwrap();
        assert_eq!(node.serialize().unwrap(), json!(5));

        let given = Node::from(json!("given"));
        let node = create_dobject(&json!({"$ref": "eq"}), &envs, Some(given), &registry).unwrap();
        assert_eq!(node.serialize().unwrap(), json!("given"));
    }

    #[test]
    fn test_create_general_class() {
        let registry = dobject_registry();
        let envs = Envs::from_value(json!({"x": 1}));
        let node = create_dobject(
            &json!({"$class": "General", "default": {"label": "run {x}"}}),
            &envs,
            None,
            &registry,
        )
        .unwrap();
        assert_eq!(node.serialize().unwrap(), json!({"label": "run 1"}));

        assert!(matches!(
            create_dobject(&json!({"$class": "file.unknown"}), &envs, None, &registry),
            Err(Error::PluginNotFound(_))
        ));
    }
}
