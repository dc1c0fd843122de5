//! Retry with exponential back-off and jitter for report fetches.
//!
//! The client never retries on its own. The orchestrator wraps each fetch in
//! [`retry_with_backoff`] with a configured attempt budget, which defaults to
//! zero retries.

use std::future::Future;
use std::time::Duration;

use crate::error::IikoError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - Network-level failures: timeout, connection reset.
/// - HTTP 5xx from the report endpoint.
///
/// **Not retriable:**
/// - [`IikoError::Auth`]: the session is gone; a new run is needed.
/// - 4xx report responses, malformed bodies, invalid ranges or URLs.
#[must_use]
pub fn is_retriable(err: &IikoError) -> bool {
    match err {
        IikoError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        IikoError::ReportFetch { status, .. } => *status >= 500,
        IikoError::Auth(_)
        | IikoError::Deserialize { .. }
        | IikoError::InvalidRange { .. }
        | IikoError::InvalidBaseUrl { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
///
/// Back-off doubles from `backoff_base_ms` with ±25 % jitter, capped at 60 s.
/// Non-retriable errors are returned immediately.
///
/// # Errors
///
/// Returns the last error from `operation` once it is non-retriable or the
/// attempt budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, IikoError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IikoError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient report error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
