//! # sitehost-store: Collection Store for the SiteHost Control Panel
//!
//! Everything the control panel persists goes through [`Store`]:
//!
//! ```text
//! caller ─▶ Store ─▶ CachedClient ─▶ ContentClient ─▶ ContentApi ─▶ remote
//!             │          (TTL cache for database/users.json)
//!             └─▶ WatermarkPolicy for every write of a project's index.html
//! ```
//!
//! - **Collections** ([`collection`]): typed JSON documents with
//!   compare-and-swap updates.
//! - **Users** ([`users`]): registration, lookup with the lazy expiry sweep,
//!   plan overrides, the editor trial clock.
//! - **Projects and hosting files** ([`projects`], [`hosting`]): deploy,
//!   edit, maintenance and archive actions, all funnelled through one
//!   watermark seam.
//! - **Billing** ([`billing`]): plan table, payment requests, payment
//!   methods.
//!
//! `Store` is cheap to clone; clones share the cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sitehost_content_client::{ContentApi, ContentClient};
use sitehost_core::{Clock, SystemClock};

pub mod billing;
pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod hosting;
pub mod projects;
pub mod users;

pub use billing::{NewPayment, PaymentDecision, VerifyOutcome};
pub use cache::CachedClient;
pub use collection::{CollectionKey, Mutation};
pub use config::StoreConfig;
pub use error::StoreError;
pub use hosting::{DeployOutcome, ExportedFile, ProjectDetails};
pub use projects::{DeleteReport, ProjectAction, ProjectView};

#[derive(Debug)]
pub struct Store<A, C = SystemClock> {
    inner: Arc<StoreInner<A, C>>,
}

#[derive(Debug)]
struct StoreInner<A, C> {
    cached: CachedClient<A, C>,
    config: StoreConfig,
}

impl<A, C> Clone for Store<A, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ContentApi, C: Clock> Store<A, C> {
    pub fn new(api: A, clock: C, config: StoreConfig) -> Self {
        let cached = CachedClient::new(ContentClient::new(api), clock, config.cache_ttl);
        Self {
            inner: Arc::new(StoreInner { cached, config }),
        }
    }

    pub fn cached(&self) -> &CachedClient<A, C> {
        &self.inner.cached
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// The raw content client, bypassing the cache.
    pub fn content(&self) -> &ContentClient<A> {
        self.inner.cached.client()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.inner.cached.clock().now()
    }
}
