//! Client semantics over a raw [`ContentApi`].
//!
//! Adds what every caller needs on top of single requests: token lookup
//! before a write, JSON-or-text decoding of fetched files, idempotent delete,
//! and logging of every failed call. Failures are returned, never swallowed:
//! a caller can always tell "the file is absent" from "the remote could not
//! be reached".

use tracing::{debug, error, warn};

use crate::api::ContentApi;
use crate::error::ContentStoreError;
use crate::types::{
    file_name, ContentToken, DeleteOutcome, DirEntry, EntryKind, Fetched, RawContent,
    StoredObject,
};

#[derive(Debug, Clone)]
pub struct ContentClient<A> {
    api: A,
}

impl<A: ContentApi> ContentClient<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The underlying raw API.
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Fetch and decode `path`.
    ///
    /// Files are parsed as JSON when possible and returned as text otherwise.
    /// A missing path is `Ok(Fetched::NotFound)`.
    pub async fn fetch(&self, path: &str) -> Result<Fetched, ContentStoreError> {
        let raw = self.api.get(path).await.map_err(|e| log_failure("fetch", path, e))?;
        Ok(match raw {
            RawContent::NotFound => Fetched::NotFound,
            RawContent::Directory(entries) => Fetched::Directory(entries),
            RawContent::File(obj) => decode(obj.bytes),
        })
    }

    /// Fetch the raw bytes of a file together with its current token.
    pub async fn fetch_object(&self, path: &str) -> Result<Option<StoredObject>, ContentStoreError> {
        let raw = self
            .api
            .get(path)
            .await
            .map_err(|e| log_failure("fetch_object", path, e))?;
        match raw {
            RawContent::File(obj) => Ok(Some(obj)),
            RawContent::NotFound => Ok(None),
            RawContent::Directory(_) => Err(log_failure(
                "fetch_object",
                path,
                ContentStoreError::NotAFile {
                    path: path.to_string(),
                },
            )),
        }
    }

    /// Write `bytes` to `path`, creating or replacing it.
    ///
    /// The current token is looked up first. A change made by someone else
    /// between that lookup and the write is not detected here; use
    /// [`put_with_token`](Self::put_with_token) with a token from an earlier
    /// read for compare-and-swap.
    pub async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        label: &str,
    ) -> Result<ContentToken, ContentStoreError> {
        let token = self.fetch_object(path).await?.map(|obj| obj.token);
        self.put_with_token(path, bytes, label, token.as_ref()).await
    }

    /// Write `bytes` to `path` only if the stored object still matches
    /// `token` (`None` = the path must not exist yet).
    pub async fn put_with_token(
        &self,
        path: &str,
        bytes: &[u8],
        label: &str,
        token: Option<&ContentToken>,
    ) -> Result<ContentToken, ContentStoreError> {
        let new_token = self
            .api
            .put(path, bytes, label, token)
            .await
            .map_err(|e| log_failure("put", path, e))?;
        debug!(path, label, bytes = bytes.len(), "stored content");
        Ok(new_token)
    }

    /// Delete `path`. Deleting something that is not there succeeds.
    pub async fn delete(&self, path: &str, label: &str) -> Result<DeleteOutcome, ContentStoreError> {
        let Some(current) = self.fetch_object(path).await? else {
            debug!(path, "delete of absent path");
            return Ok(DeleteOutcome::AlreadyAbsent);
        };
        let outcome = self
            .api
            .delete(path, label, &current.token)
            .await
            .map_err(|e| log_failure("delete", path, e))?;
        debug!(path, label, ?outcome, "deleted content");
        Ok(outcome)
    }

    /// Entries under `path`. A file path yields itself; a missing path
    /// yields nothing.
    pub async fn list(&self, path: &str) -> Result<Vec<DirEntry>, ContentStoreError> {
        let raw = self.api.get(path).await.map_err(|e| log_failure("list", path, e))?;
        Ok(match raw {
            RawContent::Directory(entries) => entries,
            RawContent::NotFound => Vec::new(),
            RawContent::File(obj) => vec![DirEntry {
                name: file_name(&obj.path).to_string(),
                size: obj.bytes.len() as u64,
                sha: Some(obj.token.as_str().to_string()),
                path: obj.path,
                kind: EntryKind::File,
                download_url: None,
            }],
        })
    }

    /// Raw bytes of a listed file.
    pub async fn download(&self, entry: &DirEntry) -> Result<Vec<u8>, ContentStoreError> {
        self.api
            .download(entry)
            .await
            .map_err(|e| log_failure("download", &entry.path, e))
    }

    /// Check that the storage repository is reachable.
    pub async fn ping(&self) -> Result<(), ContentStoreError> {
        match self.api.ping().await {
            Ok(()) => {
                tracing::info!("content store reachable");
                Ok(())
            }
            Err(e) => Err(log_failure("ping", "", e)),
        }
    }
}

/// Interpret fetched bytes: JSON when they parse, text otherwise.
pub fn decode(bytes: Vec<u8>) -> Fetched {
    match serde_json::from_slice(&bytes) {
        Ok(value) => Fetched::Json(value),
        Err(_) => Fetched::Text(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }),
    }
}

fn log_failure(operation: &'static str, path: &str, err: ContentStoreError) -> ContentStoreError {
    if err.is_conflict() {
        warn!(operation, path, error = %err, "content write lost a concurrent update");
    } else {
        error!(operation, path, error = %err, "content API call failed");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryContentApi;
    use serde_json::json;

    fn client() -> ContentClient<MemoryContentApi> {
        ContentClient::new(MemoryContentApi::new())
    }

    #[tokio::test]
    async fn fetch_decodes_json_and_falls_back_to_text() {
        let c = client();
        c.api().seed_json("database/users.json", &json!([{"username": "a"}]));
        c.api().seed("hosting/p/index.html", "<html></html>");

        assert_eq!(
            c.fetch("database/users.json").await.unwrap(),
            Fetched::Json(json!([{"username": "a"}]))
        );
        assert_eq!(
            c.fetch("hosting/p/index.html").await.unwrap(),
            Fetched::Text("<html></html>".into())
        );
        assert!(c.fetch("nope.json").await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn put_creates_then_replaces() {
        let c = client();
        c.put("a.txt", b"one", "create").await.unwrap();
        c.put("a.txt", b"two", "update").await.unwrap();
        assert_eq!(c.api().text("a.txt").unwrap(), "two");
        // One token lookup per put.
        assert_eq!(c.api().get_calls(), 2);
    }

    #[tokio::test]
    async fn deleting_a_never_existing_path_succeeds() {
        let c = client();
        assert_eq!(
            c.delete("hosting/ghost/index.html", "rm").await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
        assert_eq!(c.api().delete_calls(), 0);
    }

    #[tokio::test]
    async fn delete_removes_existing_file() {
        let c = client();
        c.api().seed("a.txt", "x");
        assert_eq!(c.delete("a.txt", "rm").await.unwrap(), DeleteOutcome::Deleted);
        assert!(c.api().object("a.txt").is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_an_error_not_absence() {
        let c = client();
        c.api().seed("a.txt", "x");
        c.api().set_unavailable(true);
        assert!(c.fetch("a.txt").await.is_err());
        assert!(c.put("a.txt", b"y", "m").await.is_err());
        assert!(c.delete("a.txt", "m").await.is_err());
        c.api().set_unavailable(false);
        assert_eq!(c.api().text("a.txt").unwrap(), "x");
    }

    #[tokio::test]
    async fn list_of_a_file_is_that_file() {
        let c = client();
        c.api().seed("404.html", "gone");
        let entries = c.list("404.html").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "404.html");
        assert_eq!(entries[0].size, 4);
        assert!(c.list("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_object_rejects_directories() {
        let c = client();
        c.api().seed("hosting/p/index.html", "x");
        let err = c.fetch_object("hosting/p").await.unwrap_err();
        assert!(matches!(err, ContentStoreError::NotAFile { .. }));
    }

    #[test]
    fn invalid_utf8_text_is_decoded_lossily() {
        let fetched = decode(vec![b'h', 0xff, b'i']);
        assert_eq!(fetched, Fetched::Text("h\u{fffd}i".into()));
    }
}
