//! Error types for upstream API access

use api2csv_core::TableError;
use thiserror::Error;

/// Errors raised while talking to an upstream API or the secret store.
///
/// URLs carried here are redacted (no query string) because upstream
/// cursors embed access tokens.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The request never produced a response
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The upstream answered with a non-success status
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded
    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A decoded payload did not have the expected structure
    #[error("Unexpected response: {0}")]
    Shape(String),

    /// Reshaping the payload into a table failed
    #[error(transparent)]
    Table(#[from] TableError),

    /// A secret could not be resolved
    #[error("Secret '{name}' unavailable: {message}")]
    Secret { name: String, message: String },

    /// Token acquisition or signing failed
    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl SourceError {
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    pub fn secret(name: &str, message: impl Into<String>) -> Self {
        Self::Secret {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// True when the upstream is at fault (bad status, undecodable body).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Status { .. } | Self::Decode { .. } | Self::Shape(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;
