use thiserror::Error;

use crate::postgres::errors::PostgresError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] PostgresError),

    #[error("Failed to write {rows} rows into '{table}' for profile {profile_id}: {source}")]
    Write {
        profile_id: String,
        table: &'static str,
        rows: usize,
        #[source]
        source: Box<StorageError>,
    },

    #[error("Unexpected column value in '{column}': {message}")]
    Conversion { column: String, message: String },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Wraps a backend failure with the profile and table it was writing to.
    pub fn write(profile_id: &str, table: &'static str, rows: usize, source: StorageError) -> Self {
        StorageError::Write {
            profile_id: profile_id.to_string(),
            table,
            rows,
            source: Box::new(source),
        }
    }

    pub fn conversion(column: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::Conversion {
            column: column.into(),
            message: message.into(),
        }
    }
}
