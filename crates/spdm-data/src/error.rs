use spdm_path::PathError;
use thiserror::Error;

/// Errors raised by nodes, entries and backends.
///
/// Every variant is cheap to clone so a failed resolution can be cached in
/// an entry's state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("not found: `{0}`")]
    NotFound(String),
    #[error("type conflict: {0}")]
    TypeConflict(String),
    #[error("index out of range: {0}")]
    OutOfRange(String),
    #[error("expected exactly one match at `{path}`, found {count}")]
    AmbiguousOrNotFound { path: String, count: usize },
    #[error("read-only: {0}")]
    ReadOnly(String),
    #[error("unsupported dtype `{0}`")]
    UnsupportedType(String),
    #[error("plugin not found: `{0}`")]
    PluginNotFound(String),
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Parse(e.to_string())
    }
}
