//! # sitehost CLI entry point
//!
//! Parses command-line arguments, loads configuration from the environment
//! and dispatches to the subcommand handlers.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sitehost_cli::billing::{run_billing, BillingArgs};
use sitehost_cli::doctor::{run_doctor, DoctorArgs};
use sitehost_cli::sites::{run_site, SiteArgs};
use sitehost_cli::users::{run_user, UserArgs};
use sitehost_cli::{load_config, open_store};

/// SiteHost control panel CLI.
///
/// Administers accounts, plans, payments and hosted projects kept in the
/// storage repository.
#[derive(Parser, Debug)]
#[command(name = "sitehost", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the configuration and check the storage repository.
    Doctor(DoctorArgs),

    /// Accounts, plan overrides and the editor trial clock.
    User(UserArgs),

    /// Hosted projects: deploy, edit, maintenance, archive, export, delete.
    Site(SiteArgs),

    /// Plan table, payment requests and payment methods.
    Billing(BillingArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(command: Commands) -> Result<u8> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (content, config) = load_config()?;
        tracing::debug!(owner = %content.owner, repo = %content.repo, "configuration loaded");
        let store = open_store(&content, config)?;

        match command {
            Commands::Doctor(args) => run_doctor(&args, &content, &store).await,
            Commands::User(args) => run_user(&args, &store).await,
            Commands::Site(args) => run_site(&args, &store).await,
            Commands::Billing(args) => run_billing(&args, &store).await,
        }
    })
}
