//! # Doctor Subcommand
//!
//! Prints the effective configuration (the storage token redacted) and
//! checks that the storage repository answers.

use anyhow::Result;
use clap::Args;
use sitehost_content_client::{ContentApi, ContentApiConfig};
use sitehost_core::Clock;
use sitehost_store::Store;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Only print the configuration; do not contact the repository.
    #[arg(long)]
    pub offline: bool,
}

pub async fn run_doctor<A: ContentApi, C: Clock>(
    args: &DoctorArgs,
    content: &ContentApiConfig,
    store: &Store<A, C>,
) -> Result<u8> {
    println!("{content:#?}");
    println!("{:#?}", store.config());
    if args.offline {
        return Ok(0);
    }

    if let Err(e) = store.content().ping().await {
        eprintln!("FAIL: {}/{} unreachable: {e}", content.owner, content.repo);
        return Ok(1);
    }
    println!("OK: {}/{} reachable", content.owner, content.repo);

    let users = store.list_users().await?;
    let plans = store.load_plans().await?;
    println!(
        "OK: {} account(s), {} plan(s) configured",
        users.len(),
        plans.iter().count()
    );
    Ok(0)
}
