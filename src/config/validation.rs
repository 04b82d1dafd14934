//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check uniqueness of endpoint names
//! - Validate value ranges (timeouts > 0, thresholds > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("duplicate endpoint name: {0}")]
    DuplicateEndpoint(String),

    #[error("endpoint {endpoint}: invalid base_url {url:?}")]
    InvalidBaseUrl { endpoint: String, url: String },

    #[error("endpoint {endpoint}: {field} must be greater than zero")]
    ZeroValue { endpoint: String, field: &'static str },

    #[error("endpoint {endpoint}: base_delay_ms exceeds max_delay_ms")]
    BackoffRange { endpoint: String },

    #[error("endpoint {endpoint}: batching max_size must be at least 2")]
    BatchTooSmall { endpoint: String },

    #[error("webhooks: dead_letter_capacity must be greater than zero")]
    ZeroDeadLetterCapacity,

    #[error("invalid {field} address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// Validate the configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        // Webhook-only deployments are legitimate.
        tracing::warn!("No endpoints configured; outbound pipeline will be idle");
    }

    let mut seen = HashSet::new();
    for ep in &config.endpoints {
        if !seen.insert(ep.name.clone()) {
            errors.push(ValidationError::DuplicateEndpoint(ep.name.clone()));
        }

        if Url::parse(&ep.base_url).is_err() {
            errors.push(ValidationError::InvalidBaseUrl {
                endpoint: ep.name.clone(),
                url: ep.base_url.clone(),
            });
        }

        let zero_checks: [(&'static str, u64); 6] = [
            ("timeout_ms", ep.timeout_ms),
            ("retry.base_delay_ms", ep.retry.base_delay_ms),
            ("circuit.failure_threshold", ep.circuit.failure_threshold as u64),
            ("circuit.window_ms", ep.circuit.window_ms),
            ("circuit.open_cooldown_ms", ep.circuit.open_cooldown_ms),
            ("queue.rate_limit_window_ms", ep.queue.rate_limit_window_ms),
        ];
        for (field, value) in zero_checks {
            if value == 0 {
                errors.push(ValidationError::ZeroValue {
                    endpoint: ep.name.clone(),
                    field,
                });
            }
        }
        if ep.queue.capacity == 0 {
            errors.push(ValidationError::ZeroValue {
                endpoint: ep.name.clone(),
                field: "queue.capacity",
            });
        }
        if ep.queue.rate_limit_requests == 0 {
            errors.push(ValidationError::ZeroValue {
                endpoint: ep.name.clone(),
                field: "queue.rate_limit_requests",
            });
        }

        if ep.retry.base_delay_ms > ep.retry.max_delay_ms {
            errors.push(ValidationError::BackoffRange {
                endpoint: ep.name.clone(),
            });
        }

        if let Some(batching) = &ep.queue.batching {
            if batching.max_size < 2 {
                errors.push(ValidationError::BatchTooSmall {
                    endpoint: ep.name.clone(),
                });
            }
        }
    }

    if config.webhooks.dead_letter_capacity == 0 {
        errors.push(ValidationError::ZeroDeadLetterCapacity);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "metrics",
            value: config.observability.metrics_address.clone(),
        });
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "admin",
            value: config.admin.bind_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
