//! # Billing Subcommand
//!
//! Plan table, upgrade payment requests and payment channels.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use sitehost_content_client::ContentApi;
use sitehost_core::{Clock, PlanTable};
use sitehost_store::{NewPayment, PaymentDecision, Store, VerifyOutcome};

use crate::print_json;

#[derive(Args, Debug)]
pub struct BillingArgs {
    #[command(subcommand)]
    pub command: BillingCommand,
}

#[derive(Subcommand, Debug)]
pub enum BillingCommand {
    /// Print the plan table, or replace it with the contents of a JSON file.
    Plans {
        #[arg(long, value_name = "FILE")]
        set: Option<PathBuf>,
    },

    /// List pending payment requests.
    Payments,

    /// Record an upgrade payment on behalf of a user.
    Submit {
        #[arg(long)]
        username: String,
        #[arg(long)]
        method: String,
        #[arg(long)]
        number: String,
        #[arg(long)]
        trx_id: String,
        #[arg(long)]
        amount: String,
        /// Plan label, e.g. "PRO Monthly".
        #[arg(long)]
        plan: String,
    },

    /// Approve or reject a pending payment request.
    Verify {
        id: i64,
        decision: PaymentDecision,
        #[arg(long)]
        username: String,
        #[arg(long)]
        plan: String,
    },

    /// Manage the payment channels shown to payers.
    Methods {
        #[command(subcommand)]
        command: MethodCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum MethodCommand {
    List,
    Add {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        number: String,
    },
    Remove {
        id: i64,
    },
}

pub async fn run_billing<A: ContentApi, C: Clock>(
    args: &BillingArgs,
    store: &Store<A, C>,
) -> Result<u8> {
    match &args.command {
        BillingCommand::Plans { set: None } => {
            print_json(&store.load_plans().await?)?;
            Ok(0)
        }
        BillingCommand::Plans { set: Some(path) } => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let plans: PlanTable = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a plan table", path.display()))?;
            store.save_plans(&plans).await?;
            println!("OK: saved {} plan(s)", plans.iter().count());
            Ok(0)
        }
        BillingCommand::Payments => {
            print_json(&store.pending_payments().await?)?;
            Ok(0)
        }
        BillingCommand::Submit {
            username,
            method,
            number,
            trx_id,
            amount,
            plan,
        } => {
            let request = store
                .submit_payment(NewPayment {
                    username: username.clone(),
                    method: method.clone(),
                    number: number.clone(),
                    trx_id: trx_id.clone(),
                    amount: parse_amount(amount),
                    plan: plan.clone(),
                })
                .await?;
            println!("OK: payment request {} recorded", request.id);
            Ok(0)
        }
        BillingCommand::Verify {
            id,
            decision,
            username,
            plan,
        } => match store.verify_payment(*id, *decision, username, plan).await? {
            VerifyOutcome::Approved {
                username,
                tier,
                days,
                expiry,
            } => {
                println!("OK: {username} upgraded to {tier} for {days} day(s), until {expiry}");
                Ok(0)
            }
            VerifyOutcome::Rejected => {
                println!("OK: request {id} rejected");
                Ok(0)
            }
            VerifyOutcome::UserMissing => {
                eprintln!("request {id} removed, but user {username} no longer exists");
                Ok(1)
            }
        },
        BillingCommand::Methods { command } => {
            let methods = match command {
                MethodCommand::List => store.list_payment_methods().await?,
                MethodCommand::Add { provider, number } => {
                    store.add_payment_method(provider, number).await?
                }
                MethodCommand::Remove { id } => store.remove_payment_method(*id).await?,
            };
            print_json(&methods)?;
            Ok(0)
        }
    }
}

/// Amounts are stored as given: numeric when they parse, text otherwise.
fn parse_amount(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(number @ Value::Number(_)) => number,
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sitehost_content_client::MemoryContentApi;
    use sitehost_core::{ManualClock, PlanTier};
    use sitehost_store::StoreConfig;

    fn store() -> Store<MemoryContentApi, ManualClock> {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        Store::new(MemoryContentApi::new(), clock, StoreConfig::default())
    }

    fn args(command: BillingCommand) -> BillingArgs {
        BillingArgs { command }
    }

    #[test]
    fn amounts_keep_their_shape() {
        assert_eq!(parse_amount("500"), serde_json::json!(500));
        assert_eq!(parse_amount("12.5"), serde_json::json!(12.5));
        assert_eq!(parse_amount("500 BDT"), serde_json::json!("500 BDT"));
    }

    #[tokio::test]
    async fn submit_then_approve() {
        let store = store();
        store.register_user("ana", "ana@example.com", "pw").await.unwrap();
        let submit = args(BillingCommand::Submit {
            username: "ana".into(),
            method: "bkash".into(),
            number: "01700000000".into(),
            trx_id: "TX1".into(),
            amount: "500".into(),
            plan: "VIP Monthly".into(),
        });
        assert_eq!(run_billing(&submit, &store).await.unwrap(), 0);
        assert!(run_billing(&submit, &store).await.is_err(), "one pending request per user");

        let id = store.pending_payments().await.unwrap()[0].id;
        let verify = args(BillingCommand::Verify {
            id,
            decision: PaymentDecision::Approve,
            username: "ana".into(),
            plan: "VIP Monthly".into(),
        });
        assert_eq!(run_billing(&verify, &store).await.unwrap(), 0);
        assert!(store.pending_payments().await.unwrap().is_empty());
        assert_eq!(
            store.find_user("ana").await.unwrap().unwrap().plan,
            PlanTier::Vip
        );
    }

    #[tokio::test]
    async fn approving_for_a_missing_user_exits_one() {
        let store = store();
        let verify = args(BillingCommand::Verify {
            id: 1,
            decision: PaymentDecision::Approve,
            username: "ghost".into(),
            plan: "PRO Monthly".into(),
        });
        assert_eq!(run_billing(&verify, &store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn methods_add_and_remove() {
        let store = store();
        let add = args(BillingCommand::Methods {
            command: MethodCommand::Add {
                provider: "nagad".into(),
                number: "01800000000".into(),
            },
        });
        run_billing(&add, &store).await.unwrap();
        let methods = store.list_payment_methods().await.unwrap();
        assert_eq!(methods.len(), 1);

        let remove = args(BillingCommand::Methods {
            command: MethodCommand::Remove { id: methods[0].id },
        });
        run_billing(&remove, &store).await.unwrap();
        assert!(store.list_payment_methods().await.unwrap().is_empty());
    }
}
