use thiserror::Error;

use crate::validation::ValidationError;

/// Errors raised by the world store and the game engines built on it.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Malformed or out-of-range input, rejected before any state change.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A unique key was already taken. Callers recover by re-reading.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around JSON errors (seed files).
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, seed files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (poisoned locks, task join errors).
    #[error("internal error: {0}")]
    Internal(String),
}

impl WorldError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WorldError::NotFound(_))
    }
}
