//! # sitehost-cli: Operator CLI for the SiteHost Control Panel
//!
//! Drives the `sitehost-store` operations against the storage repository
//! configured in the environment (see `ContentApiConfig::from_env` and
//! `StoreConfig::from_env`).
//!
//! ## Subcommands
//!
//! - `sitehost doctor`: check the configuration and reach the repository.
//! - `sitehost user`: list, register, inspect and delete accounts, override
//!   plans, read the editor trial clock.
//! - `sitehost site`: deploy, edit, inspect, archive and delete hosted
//!   projects, export their sources, publish the 404 page.
//! - `sitehost billing`: plan table, payment requests, payment methods.
//!
//! ```bash
//! sitehost user register --username ana --email ana@example.com --password s3cret
//! sitehost site deploy --owner ana --project blog ./dist/index.html
//! sitehost billing verify 1717236000000 approve --username ana --plan "VIP Monthly"
//! ```

pub mod billing;
pub mod doctor;
pub mod sites;
pub mod users;

use anyhow::{Context, Result};
use serde::Serialize;
use sitehost_content_client::{ContentApiConfig, HttpContentApi};
use sitehost_core::SystemClock;
use sitehost_store::{Store, StoreConfig};

/// Both configuration layers, read from the environment.
pub fn load_config() -> Result<(ContentApiConfig, StoreConfig)> {
    let content = ContentApiConfig::from_env().context("invalid content API configuration")?;
    let store = StoreConfig::from_env(&content).context("invalid store configuration")?;
    Ok((content, store))
}

/// A store talking to the configured repository over HTTP.
pub fn open_store(content: &ContentApiConfig, config: StoreConfig) -> Result<Store<HttpContentApi>> {
    let api = HttpContentApi::new(content).context("failed to build content API client")?;
    Ok(Store::new(api, SystemClock, config))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
