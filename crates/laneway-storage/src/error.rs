//! Storage error types for laneway-storage.
//!
//! [`StorageError`] covers all anticipated failure modes in the storage
//! layer: serialization, the database itself, entity-not-found variants for
//! each row kind, and integrity violations.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The underlying SQLite operation failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A save with the given ID was not found.
    #[error("save not found: {0}")]
    SaveNotFound(i64),

    /// An override entry was not found in the given save.
    #[error("entry not found: save={save}, node={node}, edge={edge}, lane={lane_index}")]
    EntryNotFound {
        save: i64,
        node: u32,
        edge: u32,
        lane_index: u32,
    },

    /// A holder was not found in the given save.
    #[error("holder not found: save={save}, holder={holder}")]
    HolderNotFound { save: i64, holder: u32 },

    /// The save carries no network snapshot.
    #[error("no network snapshot stored for save {0}")]
    NetworkNotFound(i64),

    /// A data integrity violation was detected.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },
}
