//! Editor trial allowance for free accounts.
//!
//! Free users get [`TRIAL_ALLOWANCE_SECS`] of editor time per
//! [`TRIAL_WINDOW_HOURS`]-hour window. The window restarts lazily the first
//! time the status is checked after it has elapsed; the editor reports usage
//! through heartbeats.

use chrono::{DateTime, Utc};

use crate::records::UserRecord;
use crate::temporal::epoch_millis;

pub const TRIAL_ALLOWANCE_SECS: i64 = 3600;
pub const TRIAL_WINDOW_HOURS: i64 = 24;
/// Seconds deducted by a heartbeat that does not say how long it covered.
pub const DEFAULT_HEARTBEAT_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStatus {
    /// Paid tiers have no editor limit.
    Unlimited,
    Remaining { seconds: i64, reset: bool },
}

impl UserRecord {
    /// Report the trial balance, restarting the window if it has elapsed.
    ///
    /// A `Remaining { reset: true, .. }` result means the record was mutated
    /// and should be persisted.
    pub fn refresh_trial(&mut self, now: DateTime<Utc>) -> TrialStatus {
        if !self.plan.is_free() {
            return TrialStatus::Unlimited;
        }
        let now_ms = epoch_millis(now);
        let last_reset = self.trial_last_reset.unwrap_or(0);
        if now_ms.saturating_sub(last_reset) > TRIAL_WINDOW_HOURS * 3_600_000 {
            self.trial_last_reset = Some(now_ms);
            self.trial_seconds_remaining = Some(TRIAL_ALLOWANCE_SECS);
            return TrialStatus::Remaining {
                seconds: TRIAL_ALLOWANCE_SECS,
                reset: true,
            };
        }
        TrialStatus::Remaining {
            seconds: self.trial_seconds_remaining.unwrap_or(0),
            reset: false,
        }
    }

    /// Deduct editor time. Returns the new balance, or `None` for paid
    /// tiers, whose records are left untouched. Negative usage counts as
    /// none.
    pub fn consume_trial(&mut self, seconds: Option<i64>) -> Option<i64> {
        if !self.plan.is_free() {
            return None;
        }
        let spent = seconds.unwrap_or(DEFAULT_HEARTBEAT_SECS).max(0);
        let remaining = self
            .trial_seconds_remaining
            .unwrap_or(0)
            .saturating_sub(spent)
            .max(0);
        self.trial_seconds_remaining = Some(remaining);
        Some(remaining)
    }
}
