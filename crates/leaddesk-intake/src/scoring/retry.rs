//! Jittered exponential back-off for the external scorer.
//!
//! The caller bounds the whole loop with the scoring timeout, so retries can
//! never extend lead capture past it.

use std::future::Future;
use std::time::Duration;

use crate::error::ScoringError;

const MAX_DELAY_MS: u64 = 5_000;

/// Connect failures, request timeouts, 429 and 5xx are worth another try.
/// Malformed output and other 4xx responses are not.
pub(crate) fn is_retriable(err: &ScoringError) -> bool {
    match err {
        ScoringError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ScoringError::Status { status, .. } => *status == 429 || *status >= 500,
        ScoringError::Timeout(_)
        | ScoringError::Malformed(_)
        | ScoringError::InvalidBaseUrl(_)
        | ScoringError::NotConfigured => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on transient errors.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScoringError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScoringError>>,
{
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
                    "scoring service transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
