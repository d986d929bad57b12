//! Typed errors for the retrieval pipeline.
//!
//! Library operations return `Result<T, KbError>`; the CLI wraps these in
//! `anyhow` for reporting. Version lifecycle violations and missing lookups
//! get their own variants so callers can match on them.

use thiserror::Error;

pub type KbResult<T> = Result<T, KbError>;

#[derive(Debug, Error)]
pub enum KbError {
    /// A version lifecycle rule was violated (e.g. archiving the active
    /// version, activating an archived one).
    #[error("invalid version state: {0}")]
    VersionState(String),

    /// `create_version` was called with a label that already exists.
    #[error("version '{0}' already exists")]
    VersionExists(String),

    /// A kb_version or entity lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Embedding provider failed. Indexing and search degrade instead of
    /// surfacing this, but the provider trait still needs an error type.
    #[error("embedding provider '{provider}' failed: {reason}")]
    Embedding { provider: String, reason: String },

    #[error("storage error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
