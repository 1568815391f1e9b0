use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event fields arrived before any event was written")]
    OrphanFields,
}
