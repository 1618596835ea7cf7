//! Workflow modules.
//!
//! An [`SpModule`] declares its input and output ports as descriptors. A run
//! resolves the inputs through [`create_dobject`], hands them to an
//! [`Actor`], and resolves the actor's result against the output ports.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use spdm_util::{deep_merge, Envs};
use tracing::debug;

use crate::descriptor::{create_dobject, dobject_registry};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::plugin::Registry;

/// Environment variable holding the id of the current module run.
pub const JOB_ID: &str = "JOB_ID";

static JOB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// The work a module does.
pub trait Actor: Send + Sync {
    fn execute(&self, inputs: &IndexMap<String, Node>, envs: &Envs) -> Result<Value>;
}

impl<F> Actor for F
where
    F: Fn(&IndexMap<String, Node>, &Envs) -> Result<Value> + Send + Sync,
{
    fn execute(&self, inputs: &IndexMap<String, Node>, envs: &Envs) -> Result<Value> {
        self(inputs, envs)
    }
}

pub struct SpModule {
    name: String,
    in_ports: IndexMap<String, Value>,
    out_ports: IndexMap<String, Value>,
    envs: Envs,
    actor: Box<dyn Actor>,
    registry: Registry<Node>,
}

impl fmt::Debug for SpModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpModule")
            .field("name", &self.name)
            .field("in_ports", &self.in_ports.keys().collect::<Vec<_>>())
            .field("out_ports", &self.out_ports.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SpModule {
    pub fn new(name: impl Into<String>, actor: impl Actor + 'static) -> Self {
        let name = name.into();
        let job = JOB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let job_id = format!("{name}_{}_{job}", std::process::id());
        let mut env = Map::new();
        env.insert(JOB_ID.to_string(), Value::String(job_id));
        Self {
            name,
            in_ports: IndexMap::new(),
            out_ports: IndexMap::new(),
            envs: Envs::from_map(env),
            actor: Box::new(actor),
            registry: dobject_registry(),
        }
    }

    /// Build from a mapping with `name`, `in_ports`, `out_ports` and `envs`.
    pub fn from_value(desc: &Value, actor: impl Actor + 'static) -> Result<Self> {
        let Value::Object(map) = desc else {
            return Err(Error::InvalidValue(format!("module descriptor must be a mapping, got {desc}")));
        };
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidValue("module descriptor has no name".to_string()))?;
        let mut module = Self::new(name, actor);
        for (port, d) in ports(map.get("in_ports"))? {
            module = module.with_in_port(&port, d);
        }
        for (port, d) in ports(map.get("out_ports"))? {
            module = module.with_out_port(&port, d);
        }
        if let Some(envs) = map.get("envs") {
            module = module.with_envs(envs.clone());
        }
        Ok(module)
    }

    /// Declare an input. Declaring a port again merges the new descriptor
    /// over the old one.
    pub fn with_in_port(mut self, name: &str, descriptor: Value) -> Self {
        overlay_port(&mut self.in_ports, name, descriptor);
        self
    }

    pub fn with_out_port(mut self, name: &str, descriptor: Value) -> Self {
        overlay_port(&mut self.out_ports, name, descriptor);
        self
    }

    /// Add an environment layer. Earlier layers are shadowed, `JOB_ID` is
    /// kept.
    pub fn with_envs(mut self, layer: Value) -> Self {
        let job_id = self.job_id().to_string();
        let mut envs = self.envs.with_layer(layer);
        envs.insert(JOB_ID, Value::String(job_id));
        self.envs = envs;
        self
    }

    pub fn with_registry(mut self, registry: Registry<Node>) -> Self {
        self.registry = registry;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn envs(&self) -> &Envs {
        &self.envs
    }

    pub fn job_id(&self) -> &str {
        self.envs.get(JOB_ID).and_then(Value::as_str).unwrap_or_default()
    }

    /// Resolve every declared input. Undeclared arguments pass through.
    pub fn inputs(&self, mut args: IndexMap<String, Node>) -> Result<IndexMap<String, Node>> {
        let mut out = IndexMap::new();
        for (port, descriptor) in &self.in_ports {
            let data = args.shift_remove(port);
            let node = create_dobject(descriptor, &self.envs, data, &self.registry)
                .map_err(|e| port_error(&self.name, port, e))?;
            out.insert(port.clone(), node);
        }
        out.extend(args);
        Ok(out)
    }

    /// Preprocess, execute, postprocess.
    ///
    /// Without output ports the whole result comes back under `output`.
    pub fn run(&self, args: IndexMap<String, Node>) -> Result<IndexMap<String, Node>> {
        debug!(module = %self.name, job = self.job_id(), "preprocess");
        let inputs = self.inputs(args)?;

        debug!(module = %self.name, inputs = inputs.len(), "execute");
        let result = self.actor.execute(&inputs, &self.envs)?;

        debug!(module = %self.name, "postprocess");
        if self.out_ports.is_empty() {
            return Ok(IndexMap::from([("output".to_string(), Node::deserialize(result))]));
        }
        let envs = self.envs.with_layer(result.clone());
        let mut outputs = IndexMap::new();
        for (port, descriptor) in &self.out_ports {
            let data = result.get(port).cloned().map(Node::deserialize);
            let node = create_dobject(descriptor, &envs, data, &self.registry)
                .map_err(|e| port_error(&self.name, port, e))?;
            outputs.insert(port.clone(), node);
        }
        Ok(outputs)
    }
}

fn overlay_port(ports: &mut IndexMap<String, Value>, name: &str, descriptor: Value) {
    match ports.get_mut(name) {
        Some(existing) => deep_merge(existing, descriptor),
        None => {
            ports.insert(name.to_string(), descriptor);
        }
    }
}

fn ports(value: Option<&Value>) -> Result<Vec<(String, Value)>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
        Some(other) => Err(Error::InvalidValue(format!("ports must be a mapping, got {other}"))),
    }
}

fn port_error(module: &str, port: &str, error: Error) -> Error {
    match error {
        Error::NotFound(msg) => Error::NotFound(format!("{module}.{port}: {msg}")),
        Error::InvalidValue(msg) => Error::InvalidValue(format!("{module}.{port}: {msg}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doubler(inputs: &IndexMap<String, Node>, _envs: &Envs) -> Result<Value> {
        let x = inputs
            .get("x")
            .and_then(|n| n.as_scalar())
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::InvalidValue("x".to_string()))?;
        Ok(json!({"y": x * 2.0, "note": "done"}))
    }

    #[test]
    fn test_run_pipeline() {
        let module = SpModule::from_value(
            &json!({
                "name": "double",
                "in_ports": {"x": {"$ref": "x0", "default": 1.0}},
                "out_ports": {"y": {}, "label": {"default": "{note} by {JOB_ID}"}},
                "envs": {"x0": 2.5}
            }),
            doubler,
        )
        .unwrap();
        assert!(module.job_id().starts_with("double_"));

        let out = module.run(IndexMap::new()).unwrap();
        assert_eq!(out["y"].serialize().unwrap(), json!(5.0));
        assert_eq!(
            out["label"].serialize().unwrap(),
            json!(format!("done by {}", module.job_id()))
        );

        let args = IndexMap::from([("x".to_string(), Node::from(json!(4.0)))]);
        let out = module.run(args).unwrap();
        assert_eq!(out["y"].serialize().unwrap(), json!(8.0));
    }

    #[test]
    fn test_no_out_ports() {
        let module = SpModule::new("raw", doubler).with_in_port("x", json!({"default": 3.0}));
        let out = module.run(IndexMap::new()).unwrap();
        assert_eq!(out["output"].serialize().unwrap(), json!({"y": 6.0, "note": "done"}));
    }

    #[test]
    fn test_port_redeclaration_merges() {
        let module = SpModule::new("merge", doubler)
            .with_in_port("x", json!({"$ref": "x0", "default": 1.0}))
            .with_in_port("x", json!({"default": 4.0}));
        let out = module.run(IndexMap::new()).unwrap();
        assert_eq!(out["output"].serialize().unwrap()["y"], json!(8.0));
    }

    #[test]
    fn test_actor_error_propagates() {
        let module = SpModule::new("bad", doubler);
        assert!(matches!(
            module.run(IndexMap::new()),
            Err(Error::InvalidValue(_))
        ));
    }
}
