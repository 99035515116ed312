//! # Plan Lifecycle
//!
//! A user's `plan` field moves along `free ⇄ {pro, vip}`:
//!
//! ```text
//!            assign_plan / approve_upgrade (sets expiryDate)
//!   free  ───────────────────────────────────────────────▶  pro | vip
//!         ◀───────────────────────────────────────────────
//!            sweep_expiry (lazy) / assign_plan(free) (clears expiryDate)
//! ```
//!
//! The downgrade is not scheduled. It is evaluated whenever a user record is
//! read, and the reader decides whether to persist the result. `admin` and
//! `superadmin` accounts are exempt from expiry whatever their plan and date.

use chrono::{DateTime, Duration, Utc};

use crate::error::CoreError;
use crate::records::{PlanTier, UserRecord};
use crate::temporal::{format_instant, parse_instant};

/// Apply the expiry rule to `user` as of `now`.
///
/// Returns the possibly downgraded record and whether anything changed.
/// A record whose expiry date is missing or unreadable never expires.
pub fn sweep_expiry(mut user: UserRecord, now: DateTime<Utc>) -> (UserRecord, bool) {
    let changed = user.sweep_expiry(now);
    (user, changed)
}

/// Expiry of a `days`-long subscription starting at `now`.
pub fn upgrade_expiry(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, CoreError> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_add_signed(span))
        .ok_or(CoreError::DurationOutOfRange(days))
}

impl UserRecord {
    /// In-place form of [`sweep_expiry`].
    pub fn sweep_expiry(&mut self, now: DateTime<Utc>) -> bool {
        if self.role.is_elevated() || self.plan.is_free() {
            return false;
        }
        match self.expiry() {
            Some(expiry) if now > expiry => {
                self.plan = PlanTier::Free;
                self.expiry_date = None;
                true
            }
            _ => false,
        }
    }

    /// Administrative plan override.
    ///
    /// Moving to `free` clears the expiry. Moving to a paid tier stores
    /// `expiry` when given (normalised to the stored timestamp format) and
    /// otherwise keeps whatever expiry the account already had.
    pub fn assign_plan(&mut self, tier: PlanTier, expiry: Option<&str>) -> Result<(), CoreError> {
        if tier.is_free() {
            self.plan = tier;
            self.expiry_date = None;
            return Ok(());
        }
        if let Some(raw) = expiry {
            let parsed =
                parse_instant(raw).ok_or_else(|| CoreError::InvalidExpiry(raw.to_string()))?;
            self.expiry_date = Some(format_instant(parsed));
        }
        self.plan = tier;
        Ok(())
    }

    /// Upgrade after an approved payment: `tier` for `days` starting `now`.
    ///
    /// A duration that puts the expiry past the representable range is an
    /// error and leaves the record untouched.
    pub fn approve_upgrade(
        &mut self,
        tier: PlanTier,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let expiry = upgrade_expiry(now, days)?;
        self.plan = tier;
        self.expiry_date = Some(format_instant(expiry));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Role;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn paid_user(role: Role, expiry: &str) -> UserRecord {
        let mut user = UserRecord::new(1, "erin", "erin@example.com", "pw");
        user.plan = PlanTier::Pro;
        user.role = role;
        user.expiry_date = Some(expiry.to_string());
        user
    }

    #[test]
    fn expired_user_is_downgraded() {
        let user = paid_user(Role::User, "2025-05-01T00:00:00.000Z");
        let (swept, changed) = sweep_expiry(user, now());
        assert!(changed);
        assert_eq!(swept.plan, PlanTier::Free);
        assert_eq!(swept.expiry_date, None);
    }

    #[test]
    fn admin_is_exempt_from_expiry() {
        let user = paid_user(Role::Admin, "2025-05-01T00:00:00.000Z");
        let (swept, changed) = sweep_expiry(user.clone(), now());
        assert!(!changed);
        assert_eq!(swept, user);
    }

    #[test]
    fn superadmin_is_exempt_from_expiry() {
        let user = paid_user(Role::Superadmin, "2020-01-01");
        assert!(!sweep_expiry(user, now()).1);
    }

    #[test]
    fn future_expiry_is_kept() {
        let user = paid_user(Role::User, "2025-07-01T00:00:00.000Z");
        let (swept, changed) = sweep_expiry(user, now());
        assert!(!changed);
        assert_eq!(swept.plan, PlanTier::Pro);
    }

    #[test]
    fn expiry_exactly_now_is_not_yet_expired() {
        let user = paid_user(Role::User, "2025-06-01T12:00:00.000Z");
        assert!(!sweep_expiry(user, now()).1);
    }

    #[test]
    fn unreadable_expiry_never_expires() {
        let user = paid_user(Role::User, "someday");
        assert!(!sweep_expiry(user, now()).1);
    }

    #[test]
    fn paid_user_without_expiry_is_kept() {
        let mut user = paid_user(Role::User, "");
        user.expiry_date = None;
        assert!(!sweep_expiry(user, now()).1);
    }

    #[test]
    fn free_user_with_stale_date_is_untouched() {
        let mut user = paid_user(Role::User, "2020-01-01");
        user.plan = PlanTier::Free;
        let (swept, changed) = sweep_expiry(user, now());
        assert!(!changed);
        assert_eq!(swept.expiry_date.as_deref(), Some("2020-01-01"));
    }

    #[test]
    fn assign_free_clears_expiry() {
        let mut user = paid_user(Role::User, "2025-07-01");
        user.assign_plan(PlanTier::Free, Some("2026-01-01")).unwrap();
        assert_eq!(user.plan, PlanTier::Free);
        assert!(user.expiry_date.is_none());
    }

    #[test]
    fn assign_paid_normalises_expiry() {
        let mut user = UserRecord::new(2, "finn", "f@example.com", "pw");
        user.assign_plan(PlanTier::Vip, Some("2026-01-01")).unwrap();
        assert_eq!(user.plan, PlanTier::Vip);
        assert_eq!(user.expiry_date.as_deref(), Some("2026-01-01T00:00:00.000Z"));
    }

    #[test]
    fn assign_paid_without_date_keeps_existing_expiry() {
        let mut user = paid_user(Role::User, "2025-07-01T00:00:00.000Z");
        user.assign_plan(PlanTier::Vip, None).unwrap();
        assert_eq!(user.plan, PlanTier::Vip);
        assert_eq!(user.expiry_date.as_deref(), Some("2025-07-01T00:00:00.000Z"));
    }

    #[test]
    fn assign_rejects_unreadable_expiry() {
        let mut user = UserRecord::new(3, "gus", "g@example.com", "pw");
        let err = user.assign_plan(PlanTier::Pro, Some("soon")).unwrap_err();
        assert_eq!(err, CoreError::InvalidExpiry("soon".into()));
        assert_eq!(user.plan, PlanTier::Free);
    }

    #[test]
    fn approve_upgrade_adds_duration() {
        let mut user = UserRecord::new(4, "hana", "h@example.com", "pw");
        user.approve_upgrade(PlanTier::Pro, 30, now()).unwrap();
        assert_eq!(user.plan, PlanTier::Pro);
        assert_eq!(user.expiry_date.as_deref(), Some("2025-07-01T12:00:00.000Z"));
    }

    #[test]
    fn approve_upgrade_rejects_unrepresentable_duration() {
        let mut user = UserRecord::new(5, "ivo", "i@example.com", "pw");
        let err = user
            .approve_upgrade(PlanTier::Vip, 4_000_000_000, now())
            .unwrap_err();
        assert_eq!(err, CoreError::DurationOutOfRange(4_000_000_000));
        assert_eq!(user.plan, PlanTier::Free);
        assert!(user.expiry_date.is_none());
    }
}
