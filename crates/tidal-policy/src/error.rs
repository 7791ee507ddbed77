//! Error types for the policy store and policy source.

use thiserror::Error;

/// Result type alias for policy store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from the redb-backed policy store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),
}

/// Errors surfaced by a policy source, on its error feed or from `get`.
#[derive(Debug, Error)]
pub enum PolicySourceError {
    #[error("policy {0:?} not found")]
    NotFound(String),

    #[error("policy store failure: {0}")]
    Store(#[from] StoreError),
}

/// Errors loading a policy file.
#[derive(Debug, Error)]
pub enum PolicyFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid policy file: {0}")]
    Invalid(String),
}
