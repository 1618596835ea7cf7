//! Layered variable environments.

use std::sync::Arc;

use serde_json::{Map, Value};

/// An ordered stack of immutable mappings. Lookups walk the layers from the
/// innermost (most recently added) to the outermost; the first hit wins.
///
/// Layers are shared between environments. [`Envs::with_layer`] returns a new
/// environment and never touches the layers of `self`.
///
/// ```
/// use serde_json::json;
/// use spdm_util::Envs;
///
/// let base = Envs::from_value(json!({"shot": 1, "device": "east"}));
/// let call = base.with_layer(json!({"shot": 2}));
///
/// assert_eq!(call.get("shot"), Some(&json!(2)));
/// assert_eq!(call.get("device"), Some(&json!("east")));
/// assert_eq!(base.get("shot"), Some(&json!(1)));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envs {
    layers: Vec<Arc<Map<String, Value>>>,
}

impl Envs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-layer environment. Non-object values give an empty one.
    pub fn from_value(value: Value) -> Self {
        Self::new().with_layer(value)
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            layers: vec![Arc::new(map)],
        }
    }

    /// A new environment with `layer` shadowing every existing layer.
    pub fn with_layer(&self, layer: Value) -> Self {
        let map = match layer {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.with_map(map)
    }

    pub fn with_map(&self, map: Map<String, Value>) -> Self {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(Arc::new(map));
        layers.extend(self.layers.iter().cloned());
        Self { layers }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set `name` in the innermost layer. The layer is copied first when it
    /// is shared with another environment.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        if self.layers.is_empty() {
            self.layers.push(Arc::new(Map::new()));
        }
        Arc::make_mut(&mut self.layers[0]).insert(name.into(), value);
    }

    /// Names visible through the environment, innermost layer first.
    pub fn keys(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for layer in &self.layers {
            for k in layer.keys() {
                if !out.contains(&k.as_str()) {
                    out.push(k.as_str());
                }
            }
        }
        out
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Collapse every layer into one mapping with shadowing applied.
    pub fn flatten(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for layer in self.layers.iter().rev() {
            for (k, v) in layer.iter() {
                out.insert(k.clone(), v.clone());
            }
        }
        out
    }
}

impl From<Map<String, Value>> for Envs {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_innermost_wins() {
        let envs = Envs::from_value(json!({"a": 1, "b": 2}))
            .with_layer(json!({"a": 10}))
            .with_layer(json!({"c": 3}));
        assert_eq!(envs.get("a"), Some(&json!(10)));
        assert_eq!(envs.get("b"), Some(&json!(2)));
        assert_eq!(envs.get("c"), Some(&json!(3)));
        assert_eq!(envs.get("d"), None);
        assert_eq!(envs.depth(), 3);
    }

    #[test]
    fn test_insert_does_not_leak_into_shared_layers() {
        let base = Envs::from_value(json!({"a": 1}));
        let mut copy = base.clone();
        copy.insert("a", json!(2));
        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(copy.get("a"), Some(&json!(2)));
    }

    #[test]
    fn test_flatten_and_keys() {
        let envs = Envs::from_value(json!({"a": 1, "b": 2})).with_layer(json!({"b": 3}));
        assert_eq!(Value::Object(envs.flatten()), json!({"a": 1, "b": 3}));
        assert_eq!(envs.keys(), vec!["b", "a"]);
    }

    #[test]
    fn test_non_object_layer_is_empty() {
        let envs = Envs::new().with_layer(json!(5));
        assert_eq!(envs.depth(), 1);
        assert!(envs.keys().is_empty());
    }
}
