//! spdm-data - lazy tree documents over pluggable storage.
//!
//! The core types are [`Node`], an in-memory polymorphic tree, and [`Entry`],
//! a path cursor into a [`Backend`]. Backends exist for in-memory trees,
//! XML files ([`xml`]), and mapping proxies ([`proxy`]). Documents and
//! collections ([`collection`]) open files by URI through plugin
//! [`Registry`] lookups, and [`flow`] wires descriptors into module runs.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use spdm_data::MemoryBackend;
//!
//! let backend = MemoryBackend::new(json!({"eq": {"ip": 1.5e6, "psi": [0.0, 1.0]}}));
//! let entry = backend.entry();
//! assert_eq!(
//!     entry.get_value("eq.psi.-1", None, false).unwrap().as_value(),
//!     Some(&json!(1.0))
//! );
//! ```

pub mod cli;
pub mod collection;
pub mod descriptor;
pub mod entry;
pub mod error;
pub mod flow;
pub mod geqdsk;
pub mod node;
pub mod plugin;
pub mod proxy;
pub mod xml;

pub use collection::{
    open_document, open_entry, Collection, Connection, Document, LocalFileCollection,
    MappingCollection, Mode,
};
pub use descriptor::{create_dobject, dobject_registry, Descriptor};
pub use entry::{Backend, Entry, Found, MemoryBackend, Resolved};
pub use error::{Error, Result};
pub use flow::{Actor, SpModule};
pub use geqdsk::Geqdsk;
pub use node::{Kind, Node, NodeClass, NodeData};
pub use plugin::{Registry, ResolverConfig};
pub use proxy::ProxyBackend;
pub use xml::{XmlBackend, XmlTree};
