//! # sitehost-content-client -- Typed client for the remote content store
//!
//! Site files and JSON collections are persisted as committed files in a
//! remote repository reached through a GitHub-compatible contents API. The
//! repository is used purely as durable blob storage; its history is never
//! read.
//!
//! ## Layers
//!
//! - [`ContentApi`]: one async method per remote request. Implemented over
//!   HTTP by [`HttpContentApi`] and in memory by [`MemoryContentApi`].
//! - [`ContentClient`]: fetch with JSON/text decoding, write with token
//!   lookup, compare-and-swap writes, idempotent delete, listing.
//!
//! ## Optimistic concurrency
//!
//! Every stored object has a [`ContentToken`]. Updates and deletes present
//! the token of the version they replace; if the object changed meanwhile
//! the remote refuses and the call fails with
//! [`ContentStoreError::Conflict`].

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod memory;
pub mod retry;
pub mod types;

pub use api::ContentApi;
pub use client::ContentClient;
pub use config::{ConfigError, ContentApiConfig};
pub use error::ContentStoreError;
pub use http::HttpContentApi;
pub use memory::MemoryContentApi;
pub use retry::RetryPolicy;
pub use types::{
    ContentToken, DeleteOutcome, DirEntry, EntryKind, Fetched, RawContent, StoredObject,
};

/// Build an HTTP-backed client from configuration.
pub fn connect(config: &ContentApiConfig) -> Result<ContentClient<HttpContentApi>, ContentStoreError> {
    Ok(ContentClient::new(HttpContentApi::new(config)?))
}
