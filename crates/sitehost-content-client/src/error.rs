//! Content API error types.

use crate::config::ConfigError;

/// Errors from remote content API calls.
///
/// An error means the operation did not happen as far as this process can
/// tell. It is never evidence about what the remote currently holds.
#[derive(Debug, thiserror::Error)]
pub enum ContentStoreError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The remote returned a non-2xx status that has no dedicated variant.
    #[error("content API {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The concurrency token presented with a write no longer matches.
    #[error("conflicting write to {path} (status {status})")]
    Conflict { path: String, status: u16 },
    /// The backend refused to serve the request at all.
    #[error("content API {endpoint} unavailable: {reason}")]
    Unavailable { endpoint: String, reason: String },
    /// A response body did not have the expected shape.
    #[error("failed to deserialize response from {endpoint}: {reason}")]
    Deserialization { endpoint: String, reason: String },
    /// Stored content could not be decoded from its transport encoding.
    #[error("cannot decode content of {path}: {reason}")]
    Encoding { path: String, reason: String },
    /// A file operation was addressed to a directory.
    #[error("{path} is a directory, not a file")]
    NotAFile { path: String },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ContentStoreError {
    /// Whether the error reports a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::Conflict { status, .. } => Some(*status),
            Self::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
