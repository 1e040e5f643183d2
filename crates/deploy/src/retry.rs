//! Bounded retry with exponential backoff.

use std::future::Future;

use tracing::warn;

use crate::client::ApiError;
use crate::config::RetryConfig;
use crate::error::DeployError;

/// Runs `request` until it succeeds, fails with a non-retryable error, or
/// the attempt budget runs out. `request` receives the 1-based attempt.
pub(crate) async fn with_retry<T, F, Fut>(
    policy: &RetryConfig,
    operation: &'static str,
    mut request: F,
) -> Result<T, DeployError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let max_attempts = policy.attempts();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match request(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(DeployError::Rejected {
                operation,
                source: err,
            });
        }

        if attempt >= max_attempts {
            return Err(DeployError::RetriesExhausted {
                operation,
                attempts: attempt,
                source: err,
            });
        }

        let delay = policy.delay_for_attempt(attempt);
        warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "request failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
