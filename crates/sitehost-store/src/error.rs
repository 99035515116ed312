//! Store error types.

use sitehost_content_client::ContentStoreError;
use sitehost_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The remote call failed; nothing is known about the remote state.
    #[error(transparent)]
    Content(#[from] ContentStoreError),
    /// A collection path holds something that is not the expected document.
    #[error("{path} does not hold a valid document: {source}")]
    Decode {
        path: String,
        source: serde_json::Error,
    },
    #[error("cannot encode {path}: {source}")]
    Encode {
        path: String,
        source: serde_json::Error,
    },
    /// Every compare-and-swap attempt lost to a concurrent writer.
    #[error("gave up updating {path} after {attempts} conflicting attempts")]
    Contention { path: String, attempts: u32 },
    #[error("{what} not found")]
    NotFound { what: String },
    /// A business rule refused the operation.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl StoreError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub(crate) fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}
