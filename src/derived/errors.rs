use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum DerivedError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
