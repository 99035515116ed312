//! # Site Subcommand
//!
//! Hosted project operations. Local files are read from disk and written
//! through the same store operations the panel uses, so the watermark policy
//! applies exactly as it does for uploads from the browser.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use sitehost_content_client::ContentApi;
use sitehost_core::Clock;
use sitehost_store::{ProjectAction, Store};

use crate::print_json;

#[derive(Args, Debug)]
pub struct SiteArgs {
    #[command(subcommand)]
    pub command: SiteCommand,
}

#[derive(Subcommand, Debug)]
pub enum SiteCommand {
    /// List the projects of an owner with their public URLs.
    List {
        #[arg(long)]
        owner: String,
    },

    /// Upload a local file into a project, subject to plan quota.
    Deploy {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        project: String,
        /// Stored file name. Defaults to the local file's name.
        #[arg(long)]
        name: Option<String>,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Replace a project file with the contents of a local text file.
    Edit {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        project: String,
        /// Stored file name. Defaults to the local file's name.
        #[arg(long)]
        name: Option<String>,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print a project file.
    Cat {
        #[arg(long)]
        project: String,
        name: String,
    },

    /// List a project's files and total size.
    Details {
        #[arg(long)]
        project: String,
    },

    /// maintenance_on, maintenance_off, archive or unarchive.
    Action {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        project: String,
        action: ProjectAction,
    },

    /// Delete every file of a project and its registry entry.
    Delete {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        project: String,
    },

    /// Download a project's files into a local directory (paid plans).
    Export {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        project: String,
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
    },

    /// Publish the site-wide 404 page.
    Publish404 {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

pub async fn run_site<A: ContentApi, C: Clock>(args: &SiteArgs, store: &Store<A, C>) -> Result<u8> {
    match &args.command {
        SiteCommand::List { owner } => {
            print_json(&store.list_projects(owner).await?)?;
            Ok(0)
        }
        SiteCommand::Deploy {
            owner,
            project,
            name,
            file,
        } => {
            let bytes = std::fs::read(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = stored_name(name.as_deref(), file)?;
            let outcome = store.deploy_file(owner, project, &name, &bytes).await?;
            let note = if outcome.watermarked { " (watermarked)" } else { "" };
            println!("OK: deployed {}{note}", outcome.path);
            Ok(0)
        }
        SiteCommand::Edit {
            owner,
            project,
            name,
            file,
        } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = stored_name(name.as_deref(), file)?;
            store.edit_file(owner, project, &name, &content).await?;
            println!("OK: saved {project}/{name}");
            Ok(0)
        }
        SiteCommand::Cat { project, name } => match store.read_file(project, name).await? {
            Some(content) => {
                println!("{content}");
                Ok(0)
            }
            None => {
                eprintln!("not found: {project}/{name}");
                Ok(1)
            }
        },
        SiteCommand::Details { project } => {
            print_json(&store.project_details(project).await?)?;
            Ok(0)
        }
        SiteCommand::Action {
            owner,
            project,
            action,
        } => {
            let status = store.project_action(owner, project, *action).await?;
            println!("OK: {action} on {project}, status {status:?}");
            Ok(0)
        }
        SiteCommand::Delete { owner, project } => {
            let report = store.delete_project(owner, project).await?;
            println!("deleted {} file(s) from {project}", report.deleted.len());
            if report.is_complete() {
                return Ok(0);
            }
            for path in &report.failed {
                eprintln!("FAILED: {path}");
            }
            Ok(1)
        }
        SiteCommand::Export {
            owner,
            project,
            out,
        } => {
            let files = store.export_project(owner, project).await?;
            std::fs::create_dir_all(out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            for file in &files {
                let target = out.join(&file.name);
                std::fs::write(&target, &file.bytes)
                    .with_context(|| format!("failed to write {}", target.display()))?;
            }
            println!("OK: exported {} file(s) to {}", files.len(), out.display());
            Ok(0)
        }
        SiteCommand::Publish404 { file } => {
            let html = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            store.publish_error_page(&html).await?;
            println!("OK: published 404 page");
            Ok(0)
        }
    }
}

fn stored_name(explicit: Option<&str>, file: &Path) -> Result<String> {
    if let Some(name) = explicit {
        return Ok(name.to_string());
    }
    match file.file_name().and_then(|n| n.to_str()) {
        Some(name) => Ok(name.to_string()),
        None => bail!("cannot derive a file name from {}", file.display()),
    }
}
