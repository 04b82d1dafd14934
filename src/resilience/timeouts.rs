//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Abort the underlying call on elapse and surface a transient failure

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{GatewayError, GatewayResult};

/// Run `fut` with a deadline; elapse maps to the transient `Timeout` error.
pub async fn with_deadline<T, F>(endpoint: &str, deadline: Duration, fut: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}
