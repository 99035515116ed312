//! Plans, upgrade payments and payment methods.
//!
//! Payments are recorded, never processed: a payer submits the transaction
//! details, an administrator checks them out of band and approves or rejects
//! the request here.

use std::str::FromStr;

use serde_json::{Map, Value};
use sitehost_content_client::ContentApi;
use sitehost_core::plan::upgrade_expiry;
use sitehost_core::temporal::epoch_millis;
use sitehost_core::{Clock, PaymentMethod, PaymentRequest, PlanTable, PlanTier};
use tracing::info;

use crate::collection::{Mutation, PAYMENTS, PAYMENT_METHODS, PLANS, USERS};
use crate::error::StoreError;
use crate::Store;

/// An upgrade request as submitted by a payer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub username: String,
    pub method: String,
    pub number: String,
    pub trx_id: String,
    pub amount: Value,
    /// Free-form plan label, e.g. "VIP Monthly".
    pub plan: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentDecision {
    Approve,
    Reject,
}

impl FromStr for PaymentDecision {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(StoreError::rejected(format!("unknown payment decision {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Approved {
        username: String,
        tier: PlanTier,
        days: u32,
        expiry: String,
    },
    Rejected,
    /// Approved, but the account no longer exists.
    UserMissing,
}

impl<A: ContentApi, C: Clock> Store<A, C> {
    /// The plan table, or the built-in defaults when none is stored.
    pub async fn load_plans(&self) -> Result<PlanTable, StoreError> {
        self.load_collection(&PLANS).await
    }

    pub async fn save_plans(&self, plans: &PlanTable) -> Result<(), StoreError> {
        self.save_collection(&PLANS, plans, "Update Plans").await?;
        info!(plans = plans.iter().count(), "plan table updated");
        Ok(())
    }

    /// Record an upgrade request. A user may have one pending request.
    pub async fn submit_payment(&self, payment: NewPayment) -> Result<PaymentRequest, StoreError> {
        let now = self.now();
        let request = PaymentRequest {
            id: epoch_millis(now),
            username: payment.username,
            method: payment.method,
            number: payment.number,
            trx_id: payment.trx_id,
            amount: payment.amount,
            plan: payment.plan,
            date: now,
            extra: Map::new(),
        };
        let stored = self
            .update_collection(&PAYMENTS, "New Payment Req", |payments| {
                if payments.iter().any(|p| p.username == request.username) {
                    return Err(StoreError::rejected("You already have a pending request."));
                }
                payments.push(request.clone());
                Ok(Mutation::Commit(request.clone()))
            })
            .await?;
        info!(username = %stored.username, id = stored.id, plan = %stored.plan, "payment submitted");
        Ok(stored)
    }

    pub async fn pending_payments(&self) -> Result<Vec<PaymentRequest>, StoreError> {
        self.load_collection(&PAYMENTS).await
    }

    /// Settle a payment request.
    ///
    /// The request is removed either way. On approval the user moves to the
    /// tier named by `plan_label` for that tier's duration starting now; a
    /// duration that cannot be applied fails before the request is touched.
    pub async fn verify_payment(
        &self,
        id: i64,
        decision: PaymentDecision,
        username: &str,
        plan_label: &str,
    ) -> Result<VerifyOutcome, StoreError> {
        let now = self.now();
        let upgrade = match decision {
            PaymentDecision::Approve => {
                let tier = PlanTier::from_payment_label(plan_label);
                let days = self.load_plans().await?.duration_days(&tier);
                upgrade_expiry(now, days)?;
                Some((tier, days))
            }
            PaymentDecision::Reject => None,
        };

        let removed = self
            .update_collection(&PAYMENTS, "Process Pay", |payments| {
                let before = payments.len();
                payments.retain(|p| p.id != id);
                Ok(if payments.len() < before {
                    Mutation::Commit(true)
                } else {
                    Mutation::Skip(false)
                })
            })
            .await?;
        info!(id, removed, ?decision, "payment request processed");

        let Some((tier, days)) = upgrade else {
            return Ok(VerifyOutcome::Rejected);
        };

        let label = format!("Approved {username}");
        let upgraded = self
            .update_collection(&USERS, &label, |users| {
                Ok(match users.iter_mut().find(|u| u.username == username) {
                    Some(user) => {
                        user.approve_upgrade(tier.clone(), days, now)?;
                        Mutation::Commit(Some(user.clone()))
                    }
                    None => Mutation::Skip(None),
                })
            })
            .await?;

        Ok(match upgraded {
            Some(user) => {
                info!(username, %tier, days, "upgrade approved");
                VerifyOutcome::Approved {
                    username: user.username,
                    tier,
                    days,
                    expiry: user.expiry_date.unwrap_or_default(),
                }
            }
            None => VerifyOutcome::UserMissing,
        })
    }

    pub async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, StoreError> {
        self.load_collection(&PAYMENT_METHODS).await
    }

    /// Add a payment channel. Returns the updated list.
    pub async fn add_payment_method(
        &self,
        provider: &str,
        number: &str,
    ) -> Result<Vec<PaymentMethod>, StoreError> {
        let id = epoch_millis(self.now());
        self.update_collection(&PAYMENT_METHODS, "Add Pay", |methods| {
            let id = methods.iter().map(|m| m.id + 1).max().map_or(id, |next| next.max(id));
            methods.push(PaymentMethod {
                id,
                provider: provider.to_string(),
                number: number.to_string(),
                extra: Map::new(),
            });
            Ok(Mutation::Commit(methods.clone()))
        })
        .await
    }

    /// Remove a payment channel by id. Returns the updated list.
    pub async fn remove_payment_method(&self, id: i64) -> Result<Vec<PaymentMethod>, StoreError> {
        self.update_collection(&PAYMENT_METHODS, "Del Pay", |methods| {
            let before = methods.len();
            methods.retain(|m| m.id != id);
            Ok(if methods.len() < before {
                Mutation::Commit(methods.clone())
            } else {
                Mutation::Skip(methods.clone())
            })
        })
        .await
    }
}
