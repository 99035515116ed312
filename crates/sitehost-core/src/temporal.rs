//! # Time Source
//!
//! Every time-dependent rule in the panel (cache freshness, plan expiry,
//! trial resets, payment approval dates) reads the current instant through
//! [`Clock`] rather than calling `Utc::now()` directly. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`] forward explicitly.
//!
//! Stored timestamps follow the format the panel has always written:
//! RFC 3339 UTC with millisecond precision and a `Z` suffix
//! (`2025-03-01T12:00:00.000Z`). Reading is lenient, see [`parse_instant`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use parking_lot::Mutex;

/// Source of the current UTC instant.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can hand one clone to the
/// component under test and keep another to advance time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward (or backward, for negative durations).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Render an instant the way stored records expect it.
pub fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored instant.
///
/// Accepts RFC 3339 with any offset, a bare `YYYY-MM-DD` date (midnight UTC),
/// and the `YYYY-MM-DDTHH:MM[:SS]` form produced by HTML date-time inputs
/// (interpreted as UTC). Anything else yields `None`.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Milliseconds since the Unix epoch, the unit used for record ids and
/// trial reset stamps.
pub fn epoch_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_clones_share_time() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        let view = clock.clone();
        clock.advance(Duration::seconds(90));
        assert_eq!(view.now(), start + Duration::seconds(90));
    }

    #[test]
    fn parse_instant_accepts_iso_with_millis() {
        let parsed = parse_instant("2025-03-01T12:00:00.000Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn parse_instant_accepts_offsets() {
        let parsed = parse_instant("2025-03-01T14:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn parse_instant_accepts_bare_date() {
        let parsed = parse_instant("2025-03-01").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn parse_instant_accepts_datetime_local() {
        let parsed = parse_instant("2025-03-01T08:30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn parse_instant_rejects_garbage() {
        assert!(parse_instant("next tuesday").is_none());
        assert!(parse_instant("").is_none());
    }

    #[test]
    fn format_instant_matches_stored_shape() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(format_instant(at), "2025-03-01T12:00:00.000Z");
    }
}
