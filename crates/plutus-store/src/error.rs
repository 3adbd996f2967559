//! Error types for plutus storage.

use plutus_core::CreditError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage and cache operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A row lock could not be acquired in time.
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// A unique key already exists.
    #[error("conflict: {entity} {key} already exists")]
    Conflict {
        /// Kind of row.
        entity: &'static str,
        /// The duplicated key.
        key: String,
    },

    /// Row to update does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of row.
        entity: &'static str,
        /// The missing key.
        key: String,
    },

    /// Cache/lock store failure.
    #[error("cache error: {0}")]
    Cache(String),
}

impl From<StoreError> for CreditError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Cache(msg) => Self::Cache(msg),
            StoreError::Conflict { key, .. } => Self::DuplicateRequest { key },
            other => Self::Storage(other.to_string()),
        }
    }
}
