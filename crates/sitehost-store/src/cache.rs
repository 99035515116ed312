//! # Read-Through Cache
//!
//! One collection, the user registry, is read on nearly every request. Its
//! decoded JSON is kept for a short TTL so that bursts of reads cost a single
//! remote fetch.
//!
//! ## Rules
//!
//! - A read of the hot path is served from the slot while
//!   `now - fetched_at < ttl`, otherwise it goes to the remote and refills
//!   the slot if the result is JSON.
//! - Every put or delete of the hot path clears the slot before returning,
//!   whether the write succeeded or failed.
//! - Each clear bumps a generation counter. A fill whose fetch started before
//!   a clear is discarded, so a slow read can never re-install a pre-write
//!   value after the write finished.
//!
//! The slot sits behind a `parking_lot::Mutex` that is never held across an
//! await point.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use sitehost_content_client::{
    ContentApi, ContentClient, ContentStoreError, ContentToken, DeleteOutcome, DirEntry, Fetched,
    StoredObject,
};
use sitehost_core::Clock;
use tracing::debug;

use crate::collection::USERS;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<CacheEntry>,
    generation: u64,
}

/// A [`ContentClient`] with a TTL cache in front of one designated path.
#[derive(Debug)]
pub struct CachedClient<A, C> {
    client: ContentClient<A>,
    clock: C,
    ttl: Duration,
    hot_path: String,
    slot: Mutex<Slot>,
}

impl<A: ContentApi, C: Clock> CachedClient<A, C> {
    /// Cache the user registry for `ttl`.
    pub fn new(client: ContentClient<A>, clock: C, ttl: Duration) -> Self {
        Self::with_hot_path(client, clock, ttl, USERS.path)
    }

    pub fn with_hot_path(
        client: ContentClient<A>,
        clock: C,
        ttl: Duration,
        hot_path: impl Into<String>,
    ) -> Self {
        Self {
            client,
            clock,
            ttl,
            hot_path: hot_path.into(),
            slot: Mutex::new(Slot::default()),
        }
    }

    pub fn client(&self) -> &ContentClient<A> {
        &self.client
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn is_hot(&self, path: &str) -> bool {
        path == self.hot_path
    }

    /// Fetch `path`, serving the hot path from the cache while fresh.
    pub async fn read(&self, path: &str) -> Result<Fetched, ContentStoreError> {
        if !self.is_hot(path) {
            return self.client.fetch(path).await;
        }

        let generation = {
            let slot = self.slot.lock();
            if let Some(entry) = &slot.entry {
                if self.clock.now() - entry.fetched_at < self.ttl {
                    debug!(path, "served from cache");
                    return Ok(Fetched::Json(entry.value.clone()));
                }
            }
            slot.generation
        };

        let fetched = self.client.fetch(path).await?;
        if let Fetched::Json(value) = &fetched {
            let mut slot = self.slot.lock();
            if slot.generation == generation {
                slot.entry = Some(CacheEntry {
                    value: value.clone(),
                    fetched_at: self.clock.now(),
                });
            } else {
                debug!(path, "discarding fill that raced a write");
            }
        }
        Ok(fetched)
    }

    /// Drop the cached value if `path` is the hot path.
    pub fn invalidate(&self, path: &str) {
        if self.is_hot(path) {
            let mut slot = self.slot.lock();
            slot.entry = None;
            slot.generation += 1;
        }
    }

    /// Whether a fresh cached value exists right now.
    pub fn is_warm(&self) -> bool {
        let slot = self.slot.lock();
        slot.entry
            .as_ref()
            .is_some_and(|e| self.clock.now() - e.fetched_at < self.ttl)
    }

    /// Uncached object fetch, for compare-and-swap cycles.
    pub async fn fetch_object(&self, path: &str) -> Result<Option<StoredObject>, ContentStoreError> {
        self.client.fetch_object(path).await
    }

    pub async fn put(
        &self,
        path: &str,
        bytes: &[u8],
        label: &str,
    ) -> Result<ContentToken, ContentStoreError> {
        let result = self.client.put(path, bytes, label).await;
        self.invalidate(path);
        result
    }

    pub async fn put_with_token(
        &self,
        path: &str,
        bytes: &[u8],
        label: &str,
        token: Option<&ContentToken>,
    ) -> Result<ContentToken, ContentStoreError> {
        let result = self.client.put_with_token(path, bytes, label, token).await;
        self.invalidate(path);
        result
    }

    pub async fn delete(&self, path: &str, label: &str) -> Result<DeleteOutcome, ContentStoreError> {
        let result = self.client.delete(path, label).await;
        self.invalidate(path);
        result
    }

    pub async fn list(&self, path: &str) -> Result<Vec<DirEntry>, ContentStoreError> {
        self.client.list(path).await
    }

    pub async fn download(&self, entry: &DirEntry) -> Result<Vec<u8>, ContentStoreError> {
        self.client.download(entry).await
    }
}
