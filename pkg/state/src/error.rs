use thiserror::Error;

/// Failures surfaced by the state store. Every variant is retryable from the
/// caller's point of view; `Conflict` means the caller wrote from a stale read.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: String },

    #[error("conflict writing {kind} {key}: version {expected} is stale (current {actual})")]
    Conflict {
        kind: &'static str,
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("{0}")]
    Backend(String),

    #[error("failed to encode or decode stored object: {0}")]
    Codec(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
