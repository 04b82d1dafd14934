//! Gateway core: per-endpoint state and the caller-facing pipeline.
//!
//! # Data Flow
//! ```text
//! Gateway::fetch(endpoint, request)
//!     → cache lookup (hit returns immediately)
//!     → single-flight guard (one refill per key)
//!     → endpoint queue (FIFO, rate-limited, bounded)
//!     → circuit breaker gate
//!     → retry with backoff
//!     → transport
//!     → cache populate + caller
//! ```
//!
//! # Design Decisions
//! - All per-endpoint state lives in the registry, built once from
//!   validated config; tests inject a fresh registry per case
//! - The breaker observes final (post-retry) outcomes, so one flaky call
//!   cannot trip the circuit while the retry layer is still absorbing it

pub mod endpoint;
pub mod pipeline;

pub use endpoint::{EndpointRegistry, EndpointState};
pub use pipeline::Gateway;
