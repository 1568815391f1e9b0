use thiserror::Error;

use super::structs::InitializationState;
use crate::derived::DerivedError;
use crate::ingestion::IngestionError;
use crate::query::QueryError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Unknown recording '{0}'")]
    UnknownRecording(String),

    #[error("Failed to read recording {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Ingestion of profile {profile_id} failed: {source}")]
    Ingestion {
        profile_id: String,
        #[source]
        source: IngestionError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Derived events of profile {profile_id} failed: {source}")]
    Derived {
        profile_id: String,
        #[source]
        source: DerivedError,
    },

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Ingestion worker panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid state transition from {from:?}")]
    InvalidTransition { from: InitializationState },
}

impl ProfileError {
    pub fn parse(path: impl Into<String>, message: impl ToString) -> Self {
        ProfileError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
