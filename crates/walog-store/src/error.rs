use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a JSON column failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record with the same unique key already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map a UNIQUE constraint violation to [`StoreError::Duplicate`].
pub(crate) fn map_unique(err: rusqlite::Error, key: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            StoreError::Duplicate(key.to_string())
        }
        other => StoreError::Sqlite(other),
    }
}
