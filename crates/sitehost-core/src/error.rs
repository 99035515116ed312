//! Error types for domain-level validation.

use thiserror::Error;

/// Errors raised while validating domain input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An expiry date could not be parsed as RFC 3339 or `YYYY-MM-DD`.
    #[error("invalid expiry date {0:?}: expected RFC 3339 or YYYY-MM-DD")]
    InvalidExpiry(String),

    /// A plan duration pushes the expiry past the supported date range.
    #[error("plan duration of {0} days is out of range")]
    DurationOutOfRange(u32),

    /// A name that becomes a storage path segment is unusable.
    #[error("invalid {kind} {value:?}: {reason}")]
    InvalidName {
        /// What the name identifies (e.g. "project name", "file name").
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}
