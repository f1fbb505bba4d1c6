use thiserror::Error;

use crate::{StreamKey, Version};

/// Errors that can occur when interacting with the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The expected stream version did not match the stored version.
    #[error("Concurrency conflict on {stream}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        stream: StreamKey,
        expected: Version,
        actual: Version,
    },

    /// The entries passed to `append` were malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// The ledger backend refused or could not take the write.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
