//! Retry logic.
//!
//! # Responsibilities
//! - Retry transient failures (timeout, 5xx, connection reset) with backoff
//! - Surface exhausted retries with the last underlying error attached
//!
//! # Design Decisions
//! - 4xx responses are never retried; the upstream has already decided
//! - Jittered backoff prevents synchronized retry storms
//! - The classification lives on GatewayError, not here

use std::future::Future;

use crate::config::RetryPolicyConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::resilience::backoff;

/// Execute `op`, retrying transient failures per `policy`.
///
/// The initial call does not count as a retry: `max_retries = 3` allows up
/// to four attempts. Exhaustion wraps the final error as `RetryExhausted`.
pub async fn execute<T, F, Fut>(
    policy: &RetryPolicyConfig,
    endpoint: &str,
    mut op: F,
) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let mut retries = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && retries < policy.max_retries => {
                retries += 1;
                let delay = backoff::delay_for(retries, policy);
                tracing::debug!(
                    endpoint = %endpoint,
                    attempt = retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) if e.is_transient() && retries > 0 => {
                return Err(GatewayError::RetryExhausted {
                    endpoint: endpoint.to_string(),
                    attempts: retries + 1,
                    source: Box::new(e),
                });
            }
            // Non-transient, or a policy that never retries: pass through.
            Err(e) => return Err(e),
        }
    }
}
