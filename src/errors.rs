//! Typed errors surfaced by the library.
//!
//! Exit-code mapping is left to callers; every failure mode a caller may
//! want to branch on has its own variant.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UnchainedError>;

#[derive(Debug, Error)]
pub enum UnchainedError {
    #[error("magic number in file {path:?} is incorrect, expected {expected:#010x}, got {got:#010x}")]
    InvalidMagic {
        path: PathBuf,
        expected: u32,
        got: u32,
    },

    #[error("header has incorrect hash in {path:?}, expected {expected}, got {got}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        got: String,
    },

    #[error("file {path:?} is corrupt: {reason}")]
    CorruptChunk { path: PathBuf, reason: String },

    /// Something that was asked for does not exist. Covers RPC lookups that
    /// come back empty as well as filtered queries that match nothing.
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("specify only a single block range at a time")]
    TooManyRanges,

    #[error("{0}")]
    Usage(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("delimited output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("bad output template: {0}")]
    Template(String),

    #[error("bad pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<reqwest::Error> for UnchainedError {
    fn from(e: reqwest::Error) -> Self {
        UnchainedError::Fetch(e.to_string())
    }
}

impl From<handlebars::TemplateError> for UnchainedError {
    fn from(e: handlebars::TemplateError) -> Self {
        UnchainedError::Template(e.to_string())
    }
}

impl From<handlebars::RenderError> for UnchainedError {
    fn from(e: handlebars::RenderError) -> Self {
        UnchainedError::Template(e.to_string())
    }
}

impl UnchainedError {
    /// True for errors that mean "the thing asked for does not exist"
    /// rather than "something went wrong while looking".
    pub fn is_not_found(&self) -> bool {
        matches!(self, UnchainedError::NotFound(_))
    }
}
