//! The raw remote contents API seam.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ContentStoreError;
use crate::types::{ContentToken, DeleteOutcome, DirEntry, RawContent};

/// Operations of a GitHub-style contents API, one call each.
///
/// Implementations perform exactly the request described. Token lookups,
/// JSON decoding and failure logging are layered on top by
/// [`ContentClient`](crate::ContentClient).
#[async_trait]
pub trait ContentApi: Send + Sync + fmt::Debug {
    /// `GET contents/{path}`.
    async fn get(&self, path: &str) -> Result<RawContent, ContentStoreError>;

    /// `PUT contents/{path}`. `token` is `None` when creating. Returns the
    /// token of the newly stored content.
    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
        token: Option<&ContentToken>,
    ) -> Result<ContentToken, ContentStoreError>;

    /// `DELETE contents/{path}`.
    async fn delete(
        &self,
        path: &str,
        message: &str,
        token: &ContentToken,
    ) -> Result<DeleteOutcome, ContentStoreError>;

    /// Raw bytes of a listed file.
    async fn download(&self, entry: &DirEntry) -> Result<Vec<u8>, ContentStoreError>;

    /// Check that the storage repository is reachable with the configured
    /// credentials.
    async fn ping(&self) -> Result<(), ContentStoreError>;
}

#[async_trait]
impl<T: ContentApi + ?Sized> ContentApi for Arc<T> {
    async fn get(&self, path: &str) -> Result<RawContent, ContentStoreError> {
        (**self).get(path).await
    }

    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        message: &str,
        token: Option<&ContentToken>,
    ) -> Result<ContentToken, ContentStoreError> {
        (**self).put(path, bytes, message, token).await
    }

    async fn delete(
        &self,
        path: &str,
        message: &str,
        token: &ContentToken,
    ) -> Result<DeleteOutcome, ContentStoreError> {
        (**self).delete(path, message, token).await
    }

    async fn download(&self, entry: &DirEntry) -> Result<Vec<u8>, ContentStoreError> {
        (**self).download(entry).await
    }

    async fn ping(&self) -> Result<(), ContentStoreError> {
        (**self).ping().await
    }
}
