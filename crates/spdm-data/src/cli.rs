//! Core logic of the `spdm-get` binary.
//!
//! ```text
//! spdm-get <uri-or-file> [path] [--lazy]
//! ```
//!
//! Opens the document through the resolver and prints the value at `path`
//! as pretty JSON. With `--lazy`, unresolved subtrees are summarized by
//! backend, path, kind and keys instead of being read in full.

use serde_json::{json, Value};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::collection::open_entry;
use crate::entry::{Entry, Resolved};
use crate::error::Error;

pub const USAGE: &str = "usage: spdm-get <uri-or-file> [path] [--lazy]";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}\n{usage}", usage = USAGE)]
    Usage(String),
    #[error(transparent)]
    Data(#[from] Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetArgs {
    pub target: String,
    pub path: Option<String>,
    pub lazy: bool,
}

/// Parse the arguments after the program name.
pub fn parse_args<I>(args: I) -> Result<GetArgs, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut positional = Vec::new();
    let mut lazy = false;
    for arg in args {
        match arg.as_str() {
            "--lazy" => lazy = true,
            "-h" | "--help" => return Err(CliError::Usage("help requested".to_string())),
            flag if flag.starts_with("--") => {
                return Err(CliError::Usage(format!("unknown flag `{flag}`")))
            }
            _ => positional.push(arg),
        }
    }
    let mut positional = positional.into_iter();
    let target = positional
        .next()
        .ok_or_else(|| CliError::Usage("missing document".to_string()))?;
    let path = positional.next();
    if let Some(extra) = positional.next() {
        return Err(CliError::Usage(format!("unexpected argument `{extra}`")));
    }
    Ok(GetArgs { target, path, lazy })
}

/// Read the requested value and render it as pretty JSON.
pub fn get(args: &GetArgs) -> Result<String, CliError> {
    let entry = open_entry(&args.target)?;
    let path = args.path.as_deref().unwrap_or_default();
    let resolved = entry.get_value(path, None, args.lazy)?;
    let value = if args.lazy {
        summarize(resolved)?
    } else {
        resolved.into_value()?
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn summarize(resolved: Resolved) -> Result<Value, Error> {
    match resolved {
        Resolved::Value(v) => Ok(v),
        Resolved::Entry(e) => describe(&e),
        Resolved::List(items) => items
            .into_iter()
            .map(summarize)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

fn describe(entry: &Entry) -> Result<Value, Error> {
    let keys: Vec<String> = entry.keys()?.iter().map(ToString::to_string).collect();
    Ok(json!({
        "$entry": entry.backend().name(),
        "path": entry.prefix().to_string(),
        "kind": format!("{:?}", entry.kind()?).to_lowercase(),
        "keys": keys,
    }))
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
