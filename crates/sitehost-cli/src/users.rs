//! # User Subcommand
//!
//! Account administration. Passwords are never printed.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use sitehost_content_client::ContentApi;
use sitehost_core::trial::TrialStatus;
use sitehost_core::{Clock, PlanTier, Role, UserRecord};
use sitehost_store::Store;

use crate::print_json;

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// List every account.
    List,

    /// Show one account, applying the plan expiry check.
    Show { username: String },

    /// Create a free account.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Check a username/password pair.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Override an account's plan (free, pro, vip, or any tier in the plan table).
    SetPlan {
        username: String,
        tier: PlanTier,
        /// Expiry for paid tiers, RFC 3339 or YYYY-MM-DD. Omit to keep the current one.
        #[arg(long)]
        expiry: Option<String>,
    },

    /// Delete an account. Hosted files stay in place.
    Delete {
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Show the editor trial balance, starting a new window when due.
    Trial { username: String },

    /// Deduct editor time from a free account.
    Heartbeat {
        username: String,
        /// Seconds used since the last heartbeat (default 10).
        #[arg(long)]
        seconds: Option<i64>,
    },
}

/// Printable account without credentials.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserSummary<'a> {
    id: i64,
    username: &'a str,
    email: &'a str,
    plan: &'a PlanTier,
    role: &'a Role,
    expiry_date: Option<&'a str>,
}

impl<'a> From<&'a UserRecord> for UserSummary<'a> {
    fn from(user: &'a UserRecord) -> Self {
        Self {
            id: user.id,
            username: &user.username,
            email: &user.email,
            plan: &user.plan,
            role: &user.role,
            expiry_date: user.expiry_date.as_deref(),
        }
    }
}

pub async fn run_user<A: ContentApi, C: Clock>(args: &UserArgs, store: &Store<A, C>) -> Result<u8> {
    match &args.command {
        UserCommand::List => {
            let users = store.list_users().await?;
            let summaries: Vec<UserSummary<'_>> = users.iter().map(UserSummary::from).collect();
            print_json(&summaries)?;
            Ok(0)
        }
        UserCommand::Show { username } => match store.find_user(username).await? {
            Some(user) => {
                print_json(&UserSummary::from(&user))?;
                Ok(0)
            }
            None => {
                eprintln!("no such user: {username}");
                Ok(1)
            }
        },
        UserCommand::Register {
            username,
            email,
            password,
        } => {
            let user = store.register_user(username, email, password).await?;
            println!("OK: registered {} (id {})", user.username, user.id);
            Ok(0)
        }
        UserCommand::Login { username, password } => {
            match store.verify_credentials(username, password).await? {
                Some(user) => {
                    println!("OK: {} ({} plan)", user.username, user.plan);
                    Ok(0)
                }
                None => {
                    eprintln!("invalid credentials");
                    Ok(1)
                }
            }
        }
        UserCommand::SetPlan {
            username,
            tier,
            expiry,
        } => {
            let user = store
                .assign_plan(username, tier.clone(), expiry.as_deref())
                .await?;
            println!(
                "OK: {} is now on {} (expires {})",
                user.username,
                user.plan,
                user.expiry_date.as_deref().unwrap_or("never")
            );
            Ok(0)
        }
        UserCommand::Delete { username, password } => {
            store.delete_account(username, password).await?;
            println!("OK: deleted {username}");
            Ok(0)
        }
        UserCommand::Trial { username } => {
            match store.trial_status(username).await? {
                TrialStatus::Unlimited => println!("{username}: unlimited"),
                TrialStatus::Remaining { seconds, reset } => {
                    let note = if reset { " (window restarted)" } else { "" };
                    println!("{username}: {seconds}s remaining{note}");
                }
            }
            Ok(0)
        }
        UserCommand::Heartbeat { username, seconds } => {
            match store.trial_heartbeat(username, *seconds).await? {
                Some(left) => println!("{username}: {left}s remaining"),
                None => println!("{username}: unlimited"),
            }
            Ok(0)
        }
    }
}
