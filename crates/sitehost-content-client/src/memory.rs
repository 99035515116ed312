//! In-memory implementation of [`ContentApi`].
//!
//! Backs the stub server and every storage test. Objects live in an ordered
//! map; tokens are the SHA-256 of the stored bytes, so any change of content
//! invalidates outstanding tokens just like the hosted API does.
//!
//! Test hooks:
//! - call counters per operation ([`MemoryContentApi::get_calls`] …),
//! - [`MemoryContentApi::set_unavailable`] to fail every call,
//! - [`MemoryContentApi::interleave_write`] to simulate another writer
//!   committing between a caller's read and its write.
//!
//! Locks are `parking_lot` and are never held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};

use crate::api::ContentApi;
use crate::error::ContentStoreError;
use crate::types::{file_name, ContentToken, DeleteOutcome, DirEntry, EntryKind, RawContent, StoredObject};

/// Status reported when a presented token is stale.
const STALE_TOKEN_STATUS: u16 = 409;
/// Status reported when a create targets a path that already exists.
const MISSING_TOKEN_STATUS: u16 = 422;

#[derive(Debug, Clone, Default)]
pub struct MemoryContentApi {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    pending_foreign: Mutex<HashMap<String, Vec<u8>>>,
    download_base: RwLock<Option<String>>,
    unavailable: AtomicBool,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    downloads: AtomicUsize,
}

/// Token of `bytes`: lowercase hex SHA-256.
pub fn content_token(bytes: &[u8]) -> ContentToken {
    let digest = Sha256::digest(bytes);
    ContentToken::new(digest.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

impl MemoryContentApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL used for `download_url` in directory listings, e.g. the stub
    /// server's own address. Without one, listings carry no download URL.
    pub fn set_download_base(&self, base: impl Into<String>) {
        let base = base.into();
        *self.inner.download_base.write() = Some(base.trim_end_matches('/').to_string());
    }

    /// Store `bytes` at `path` directly, bypassing counters and tokens.
    pub fn seed(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.inner
            .objects
            .write()
            .insert(normalize(path).to_string(), bytes.into());
    }

    pub fn seed_json(&self, path: &str, value: &serde_json::Value) {
        self.seed(path, value.to_string());
    }

    /// Current bytes at `path`, without counting a call.
    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.objects.read().get(normalize(path)).cloned()
    }

    /// Current content at `path` parsed as JSON.
    pub fn json(&self, path: &str) -> Option<serde_json::Value> {
        self.object(path)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    pub fn text(&self, path: &str) -> Option<String> {
        self.object(path)
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    pub fn token_of(&self, path: &str) -> Option<ContentToken> {
        self.object(path).map(|bytes| content_token(&bytes))
    }

    pub fn paths(&self) -> Vec<String> {
        self.inner.objects.read().keys().cloned().collect()
    }

    /// Make every subsequent call fail with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Have another writer store `bytes` at `path` immediately before the
    /// next `put` to that path is applied. Fires once.
    pub fn interleave_write(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.inner
            .pending_foreign
            .lock()
            .insert(normalize(path).to_string(), bytes.into());
    }

    pub fn get_calls(&self) -> usize {
        self.inner.gets.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.inner.puts.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.deletes.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.inner.downloads.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        for counter in [
            &self.inner.gets,
            &self.inner.puts,
            &self.inner.deletes,
            &self.inner.downloads,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn check_available(&self, endpoint: &str) -> Result<(), ContentStoreError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(ContentStoreError::Unavailable {
                endpoint: endpoint.to_string(),
                reason: "in-memory backend switched off".into(),
            });
        }
        Ok(())
    }

    fn download_url(&self, path: &str) -> Option<String> {
        self.inner
            .download_base
            .read()
            .as_ref()
            .map(|base| format!("{base}/raw/{path}"))
    }

    fn list_children(&self, dir: &str) -> Vec<DirEntry> {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };
        let objects = self.inner.objects.read();
        let mut children: BTreeMap<String, DirEntry> = BTreeMap::new();
        for (key, bytes) in objects.range(prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            match rest.split_once('/') {
                Some((sub, _)) => {
                    let path = format!("{prefix}{sub}");
                    children.entry(sub.to_string()).or_insert_with(|| DirEntry {
                        name: sub.to_string(),
                        path,
                        kind: EntryKind::Dir,
                        size: 0,
                        download_url: None,
                        sha: None,
                    });
                }
                None => {
                    children.insert(
                        rest.to_string(),
                        DirEntry {
                            name: rest.to_string(),
                            path: key.clone(),
                            kind: EntryKind::File,
                            size: bytes.len() as u64,
                            download_url: self.download_url(key),
                            sha: Some(content_token(bytes).as_str().to_string()),
                        },
                    );
                }
            }
        }
        children.into_values().collect()
    }
}

#[async_trait]
impl ContentApi for MemoryContentApi {
    async fn get(&self, path: &str) -> Result<RawContent, ContentStoreError> {
        self.inner.gets.fetch_add(1, Ordering::SeqCst);
        self.check_available(&format!("GET contents/{path}"))?;
        let path = normalize(path);

        if let Some(bytes) = self.inner.objects.read().get(path) {
            return Ok(RawContent::File(StoredObject {
                path: path.to_string(),
                token: content_token(bytes),
                bytes: bytes.clone(),
            }));
        }
        let children = self.list_children(path);
        if children.is_empty() && !path.is_empty() {
            return Ok(RawContent::NotFound);
        }
        Ok(RawContent::Directory(children))
    }

    async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        _message: &str,
        token: Option<&ContentToken>,
    ) -> Result<ContentToken, ContentStoreError> {
        self.inner.puts.fetch_add(1, Ordering::SeqCst);
        self.check_available(&format!("PUT contents/{path}"))?;
        let path = normalize(path);

        let foreign = self.inner.pending_foreign.lock().remove(path);
        let mut objects = self.inner.objects.write();
        if let Some(foreign) = foreign {
            objects.insert(path.to_string(), foreign);
        }

        let conflict = |status| ContentStoreError::Conflict {
            path: path.to_string(),
            status,
        };
        match (objects.get(path), token) {
            (Some(current), Some(presented)) if content_token(current) != *presented => {
                return Err(conflict(STALE_TOKEN_STATUS));
            }
            (Some(_), None) => return Err(conflict(MISSING_TOKEN_STATUS)),
            (None, Some(_)) => return Err(conflict(STALE_TOKEN_STATUS)),
            _ => {}
        }
        objects.insert(path.to_string(), bytes.to_vec());
        Ok(content_token(bytes))
    }

    async fn delete(
        &self,
        path: &str,
        _message: &str,
        token: &ContentToken,
    ) -> Result<DeleteOutcome, ContentStoreError> {
        self.inner.deletes.fetch_add(1, Ordering::SeqCst);
        self.check_available(&format!("DELETE contents/{path}"))?;
        let path = normalize(path);

        let mut objects = self.inner.objects.write();
        match objects.get(path) {
            None => Ok(DeleteOutcome::AlreadyAbsent),
            Some(current) if content_token(current) != *token => Err(ContentStoreError::Conflict {
                path: path.to_string(),
                status: STALE_TOKEN_STATUS,
            }),
            Some(_) => {
                objects.remove(path);
                Ok(DeleteOutcome::Deleted)
            }
        }
    }

    async fn download(&self, entry: &DirEntry) -> Result<Vec<u8>, ContentStoreError> {
        self.inner.downloads.fetch_add(1, Ordering::SeqCst);
        let endpoint = format!("GET raw/{}", entry.path);
        self.check_available(&endpoint)?;
        match self.object(&entry.path) {
            Some(bytes) => Ok(bytes),
            None if self.list_children(normalize(&entry.path)).is_empty() => {
                Err(ContentStoreError::Api {
                    endpoint,
                    status: 404,
                    body: format!("{} not found", file_name(&entry.path)),
                })
            }
            None => Err(ContentStoreError::NotAFile {
                path: entry.path.clone(),
            }),
        }
    }

    async fn ping(&self) -> Result<(), ContentStoreError> {
        self.check_available("GET repo")
    }
}
