//! Store error taxonomy.

/// Failures surfaced by the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(String),

    /// A row exists but one of its columns could not be decoded.
    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        /// Table the row came from.
        table: &'static str,
        /// Offending column.
        column: &'static str,
        /// What failed to decode.
        detail: String,
    },

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem-level failure (database directory creation).
    #[error("IO error: {0}")]
    Io(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}
