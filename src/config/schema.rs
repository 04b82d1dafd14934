//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the integration gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upstream endpoint definitions.
    pub endpoints: Vec<EndpointConfig>,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Webhook dispatch settings.
    pub webhooks: WebhookConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin/diagnostic surface settings.
    pub admin: AdminConfig,
}

impl GatewayConfig {
    /// Look up an endpoint definition by name.
    pub fn endpoint(&self, name: &str) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

/// One upstream endpoint and its resilience parameters.
///
/// Immutable after load; changing any of these requires a restart.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Unique endpoint identifier used in logs, metrics and cache keys.
    pub name: String,

    /// Base URL requests are resolved against (e.g., "https://api.example.gov").
    pub base_url: String,

    /// Per-request deadline in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Cache TTL for successful responses in milliseconds. 0 disables caching.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryPolicyConfig,

    /// Circuit breaker thresholds.
    #[serde(default)]
    pub circuit: CircuitBreakerConfig,

    /// Request queue and rate limit settings.
    #[serde(default)]
    pub queue: QueueConfig,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_cache_ttl_ms() -> u64 {
    30_000
}

/// Retry policy applied to outbound calls and webhook deliveries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Maximum number of retry attempts after the initial call.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Cap on the backoff delay in milliseconds.
    pub max_delay_ms: u64,

    /// Apply full jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            jitter: true,
        }
    }
}

/// Circuit breaker thresholds for one endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures within the rolling window that open the circuit.
    pub failure_threshold: u32,

    /// Rolling window for failure counting in milliseconds.
    pub window_ms: u64,

    /// Time the circuit stays open before admitting a probe, in milliseconds.
    pub open_cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window_ms: 60_000,
            open_cooldown_ms: 30_000,
        }
    }
}

/// What to do when an endpoint's queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail the new enqueue with a queue-full error.
    RejectNew,
    /// Evict the oldest pending request to make room.
    DropOldest,
}

/// Request queue configuration for one endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of pending requests.
    pub capacity: usize,

    /// Behavior when the queue is full.
    pub overflow: OverflowPolicy,

    /// Dispatches allowed per rate window.
    pub rate_limit_requests: u32,

    /// Rate window in milliseconds.
    pub rate_limit_window_ms: u64,

    /// Optional coalescing of batchable requests into one upstream call.
    pub batching: Option<BatchingConfig>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            overflow: OverflowPolicy::RejectNew,
            rate_limit_requests: 10,
            rate_limit_window_ms: 1000,
            batching: None,
        }
    }
}

/// Batching settings. Only consecutive batchable requests are merged, so
/// FIFO dispatch order is preserved.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchingConfig {
    /// Maximum number of requests merged into one upstream call.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
}

fn default_batch_max_size() -> usize {
    10
}

/// Response cache settings shared by all endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Interval between expired-entry sweeps in milliseconds.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 30_000,
        }
    }
}

/// Webhook dispatch settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Maximum dead-letter entries retained for inspection/replay.
    pub dead_letter_capacity: usize,

    /// Retry policy for subscriptions registered without one.
    pub default_retry: RetryPolicyConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            dead_letter_capacity: 1000,
            default_retry: RetryPolicyConfig::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin/diagnostic surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin surface.
    pub enabled: bool,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
