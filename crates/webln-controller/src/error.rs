//! Error types for controller storage.

use thiserror::Error;
use webln_core::WeblnError;

/// Errors from the authorization persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document could not be (de)serialized.
    #[error("storage format error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for WeblnError {
    fn from(error: StoreError) -> Self {
        WeblnError::Internal(error.to_string())
    }
}
