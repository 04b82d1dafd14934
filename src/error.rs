//! Error taxonomy for the gateway.
//!
//! # Responsibilities
//! - One typed error for every way an upstream call or webhook delivery can fail
//! - Classification: transient failures are retried, client errors surface immediately
//! - Every wrapped failure keeps its original cause attached
//!
//! # Design Decisions
//! - Causes are stored as strings or boxed `GatewayError`s so the whole enum
//!   is `Clone`; the single-flight guard hands every coalesced waiter the
//!   same error value
//! - Transient vs. non-transient is decided here, in one place, not at call sites

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the gateway pipeline and the webhook dispatcher.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connection-level failure reaching the upstream (DNS, reset, refused).
    #[error("network error calling {endpoint}: {reason}")]
    Network { endpoint: String, reason: String },

    /// The upstream did not answer within the endpoint deadline.
    #[error("request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Upstream returned a 5xx response.
    #[error("upstream {endpoint} returned server error {status}")]
    Server { endpoint: String, status: u16 },

    /// Upstream rejected the request with a 4xx response. Never retried.
    #[error("upstream {endpoint} rejected request with status {status}")]
    Client { endpoint: String, status: u16 },

    /// Circuit breaker is open; the call was not attempted.
    #[error("circuit open for {endpoint}, retry after {retry_after_ms}ms")]
    CircuitOpen { endpoint: String, retry_after_ms: u64 },

    /// All retry attempts were consumed; wraps the last underlying error.
    #[error("retries exhausted for {endpoint} after {attempts} attempts")]
    RetryExhausted {
        endpoint: String,
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    /// The endpoint's request queue is at capacity.
    #[error("request queue full for {endpoint}")]
    QueueFull { endpoint: String },

    /// The request was dropped before dispatch (caller cancelled or shutdown).
    #[error("request canceled before dispatch")]
    Canceled,

    /// Webhook delivery failed after exhausting the subscription's retries.
    #[error("webhook delivery to subscription {subscription} failed after {attempts} attempts")]
    DeliveryFailed {
        subscription: Uuid,
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    /// No endpoint with this name was configured.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// A webhook handler rejected the event as unprocessable. Never retried.
    #[error("handler rejected event: {0}")]
    HandlerRejected(String),
}

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// True if the failure class may succeed on a later attempt.
    ///
    /// Timeouts, connection failures and 5xx responses are transient; 4xx
    /// responses and structural errors (queue full, circuit open) are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Network { .. } | GatewayError::Timeout { .. } | GatewayError::Server { .. }
        )
    }

    /// True if this failure should count toward an endpoint's circuit threshold.
    ///
    /// An exhausted retry counts as whatever its underlying cause was; client
    /// errors prove the upstream is alive and never count.
    pub fn counts_toward_circuit(&self) -> bool {
        match self {
            GatewayError::RetryExhausted { source, .. } => source.counts_toward_circuit(),
            other => other.is_transient(),
        }
    }
}
