use std::path::PathBuf;

use thiserror::Error;

/// Every fallible operation in the engine returns one of these kinds.
/// Read operations report missing pages/blocks as empty structured results,
/// not errors; write operations use `NotFound`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("path escapes vault boundary: {0}")]
    PathEscape(PathBuf),

    #[error("vault is read-only")]
    ReadOnly,

    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("io error during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Wrap an io::Error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
