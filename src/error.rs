//! Error types for latticectl
//!
//! Uses `thiserror` for library errors. Parse-time and per-operation
//! failures are collected into reports rather than returned through this
//! type; only run-aborting conditions propagate as `LatticeError`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for latticectl operations
pub type LatticeResult<T> = Result<T, LatticeError>;

/// Main error type for latticectl operations
#[derive(Error, Debug)]
pub enum LatticeError {
    /// No registered kind matches the given name or alias
    #[error("unknown kind '{name}' - run 'latticectl kinds' to list registered kinds")]
    UnknownKind { name: String },

    /// Two kinds share an alias, making lookup ambiguous
    #[error("ambiguous kind alias '{alias}' shared by '{first}' and '{second}'")]
    AmbiguousKind {
        alias: String,
        first: String,
        second: String,
    },

    /// Document failed to parse
    #[error("malformed document from {origin}: {message}")]
    MalformedDocument {
        origin: String,
        message: String,
        /// 1-based line/column when the underlying parser reports one
        location: Option<(usize, usize)>,
    },

    /// Source produced no documents for an operation that requires at least one
    #[error("no documents found in {origin}")]
    EmptySource { origin: String },

    /// Invalid `path=value` argument
    #[error("invalid data path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// Transport-level failure reaching the control plane
    #[error("control plane unreachable: {message}")]
    RemoteUnavailable { message: String },

    /// Remote rejected an update because of a revision precondition
    #[error("conflict updating {kind}/{id}: remote revision changed")]
    Conflict { kind: String, id: String },

    /// Resource does not exist on the remote side
    #[error("{kind}/{id} not found")]
    NotFound { kind: String, id: String },

    /// Directory not found
    #[error("directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Connection config could not be loaded
    #[error("invalid configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },
}
