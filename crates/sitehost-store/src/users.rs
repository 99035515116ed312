//! User registry operations.
//!
//! Reads go through the cached registry. Whenever a read finds a paid plan
//! past its expiry, the downgrade is written back with a compare-and-swap
//! update that re-applies the sweep to the freshest copy.

use sitehost_content_client::ContentApi;
use sitehost_core::records::validate_segment;
use sitehost_core::temporal::epoch_millis;
use sitehost_core::trial::TrialStatus;
use sitehost_core::{Clock, PlanTier, UserRecord};
use tracing::info;

use crate::collection::{Mutation, USERS};
use crate::error::StoreError;
use crate::Store;

impl<A: ContentApi, C: Clock> Store<A, C> {
    /// Create a free account. Reserved names and a username or email that is
    /// already taken are refused.
    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, StoreError> {
        if self.config().is_reserved(username) {
            return Err(StoreError::rejected("Username not allowed"));
        }
        validate_segment("username", username)?;

        let user = UserRecord::new(epoch_millis(self.now()), username, email, password);
        let label = format!("New User: {username}");
        let created = self
            .update_collection(&USERS, &label, |users| {
                if users
                    .iter()
                    .any(|u| u.username == user.username || u.email == user.email)
                {
                    return Err(StoreError::rejected("User exists"));
                }
                users.push(user.clone());
                Ok(Mutation::Commit(user.clone()))
            })
            .await?;
        info!(username, "registered user");
        Ok(created)
    }

    /// Look a user up, applying the expiry sweep and persisting a downgrade.
    pub async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.load_collection(&USERS).await?;
        let Some(mut user) = users.into_iter().find(|u| u.username == username) else {
            return Ok(None);
        };
        let now = self.now();
        if user.sweep_expiry(now) {
            self.persist_sweep(username).await?;
        }
        Ok(Some(user))
    }

    /// The account matching `username` and `password`, if any.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .find_user(username)
            .await?
            .filter(|u| u.password == password))
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        self.load_collection(&USERS).await
    }

    /// Remove an account after checking its password. Hosted files are left
    /// in place.
    pub async fn delete_account(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let label = format!("Delete User {username}");
        self.update_collection(&USERS, &label, |users| {
            let idx = users
                .iter()
                .position(|u| u.username == username)
                .ok_or_else(|| StoreError::not_found(format!("user {username}")))?;
            if users[idx].password != password {
                return Err(StoreError::rejected("Incorrect password"));
            }
            users.remove(idx);
            Ok(Mutation::Commit(()))
        })
        .await?;
        info!(username, "deleted account");
        Ok(())
    }

    /// Administrative plan override. See [`UserRecord::assign_plan`].
    pub async fn assign_plan(
        &self,
        username: &str,
        tier: PlanTier,
        expiry: Option<&str>,
    ) -> Result<UserRecord, StoreError> {
        let label = format!("Update Plan: {username}");
        let user = self
            .update_collection(&USERS, &label, |users| {
                let user = users
                    .iter_mut()
                    .find(|u| u.username == username)
                    .ok_or_else(|| StoreError::not_found(format!("user {username}")))?;
                user.assign_plan(tier.clone(), expiry)?;
                Ok(Mutation::Commit(user.clone()))
            })
            .await?;
        info!(username, plan = %user.plan, expiry = ?user.expiry_date, "plan assigned");
        Ok(user)
    }

    /// Editor allowance of `username`, restarting the daily window when due.
    pub async fn trial_status(&self, username: &str) -> Result<TrialStatus, StoreError> {
        let now = self.now();
        let mut user = self
            .find_user(username)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("user {username}")))?;

        let status = user.refresh_trial(now);
        if !matches!(status, TrialStatus::Remaining { reset: true, .. }) {
            return Ok(status);
        }
        let label = format!("Trial Reset {username}");
        self.update_collection(&USERS, &label, |users| {
            let user = users
                .iter_mut()
                .find(|u| u.username == username)
                .ok_or_else(|| StoreError::not_found(format!("user {username}")))?;
            Ok(match user.refresh_trial(now) {
                status @ TrialStatus::Remaining { reset: true, .. } => Mutation::Commit(status),
                status => Mutation::Skip(status),
            })
        })
        .await
    }

    /// Deduct editor time. Returns the remaining balance, or `None` when the
    /// account is on a paid tier. An expired plan is swept first, so it is
    /// charged like any free account.
    pub async fn trial_heartbeat(
        &self,
        username: &str,
        seconds: Option<i64>,
    ) -> Result<Option<i64>, StoreError> {
        self.find_user(username)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("user {username}")))?;
        let label = format!("Trial Heartbeat {username}");
        self.update_collection(&USERS, &label, |users| {
            let user = users
                .iter_mut()
                .find(|u| u.username == username)
                .ok_or_else(|| StoreError::not_found(format!("user {username}")))?;
            Ok(match user.consume_trial(seconds) {
                Some(left) => Mutation::Commit(Some(left)),
                None => Mutation::Skip(None),
            })
        })
        .await
    }

    async fn persist_sweep(&self, username: &str) -> Result<(), StoreError> {
        let now = self.now();
        let label = format!("Plan Expired: {username}");
        let downgraded = self
            .update_collection(&USERS, &label, |users| {
                let expired = users
                    .iter_mut()
                    .find(|u| u.username == username)
                    .map_or(false, |u| u.sweep_expiry(now));
                Ok(if expired {
                    Mutation::Commit(true)
                } else {
                    Mutation::Skip(false)
                })
            })
            .await?;
        if downgraded {
            info!(username, "paid plan expired, downgraded to free");
        }
        Ok(())
    }
}
