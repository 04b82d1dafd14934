//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Queued request to upstream:
//!     → circuit_breaker.rs (fail fast if the endpoint is known bad)
//!     → retries.rs (retry transient failures with backoff)
//!     → timeouts.rs (enforce per-call deadline)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for transient failure classes, never 4xx
//! - Circuit breaker is per-endpoint, not global
//! - A timed-out call is a transient failure for retry and circuit purposes

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;
