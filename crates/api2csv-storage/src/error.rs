//! Error types for artifact storage

use api2csv_core::TableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist
    #[error("Object not found: {path}")]
    NotFound { path: String },

    /// The backend rejected or failed an operation
    #[error("Storage {operation} failed for '{path}': {source}")]
    Backend {
        operation: &'static str,
        path: String,
        #[source]
        source: opendal::Error,
    },

    /// Storage could not be set up from the configuration
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// A stored artifact could not be encoded or decoded
    #[error("Artifact codec error: {0}")]
    Codec(#[from] TableError),
}

impl StorageError {
    /// Map an opendal error, keeping NotFound distinguishable.
    pub(crate) fn backend(operation: &'static str, path: &str, source: opendal::Error) -> Self {
        if source.kind() == opendal::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_string(),
            }
        } else {
            Self::Backend {
                operation,
                path: path.to_string(),
                source,
            }
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
