//! Retry logic with exponential backoff for content API HTTP calls.
//!
//! Reads retry transport errors (connection failures, timeouts) and 5xx
//! responses. A PUT or DELETE is retried only when the connection could not
//! be opened; a write that may have reached the server is never replayed.
//! Everything else, including 4xx conflicts, is returned on the first
//! attempt.

use std::time::Duration;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms).
pub const BASE_DELAY_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Which failures a request may be replayed after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryOn {
    /// Idempotent reads: transport errors and 5xx replies.
    Transient,
    /// Writes: only errors raised before the request was sent.
    ConnectFailure,
}

impl RetryOn {
    fn retries_status(self, status: reqwest::StatusCode) -> bool {
        self == RetryOn::Transient && status.is_server_error()
    }

    fn retries_error(self, e: &reqwest::Error) -> bool {
        match self {
            RetryOn::Transient => true,
            RetryOn::ConnectFailure => e.is_connect(),
        }
    }
}

/// Send an HTTP request, retrying the failures `retry_on` allows.
///
/// The closure `f` is called up to `policy.max_retries + 1` times. The last
/// response or error is returned as-is, so a caller always sees the real
/// final status.
pub(crate) async fn retry_send<F, Fut>(
    policy: RetryPolicy,
    retry_on: RetryOn,
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..policy.max_retries {
        let delay = policy.delay(attempt);
        match f().await {
            Ok(resp) if retry_on.retries_status(resp.status()) => {
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    status = resp.status().as_u16(),
                    "content API returned a server error, retrying in {delay:?}"
                );
            }
            Ok(resp) => return Ok(resp),
            Err(e) if retry_on.retries_error(&e) => {
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    "content API request failed, retrying in {delay:?}: {e}"
                );
            }
            Err(e) => return Err(e),
        }
        tokio::time::sleep(delay).await;
    }
    f().await
}
