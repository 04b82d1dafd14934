//! Outbound request queue subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway::fetch (cache miss)
//!     → dispatcher.rs enqueue (bounded FIFO per endpoint, fail-fast on full)
//!     → drain worker (token_bucket.rs pacing)
//!     → batch coalescing (optional, consecutive batchable requests only)
//!     → EndpointState::execute (breaker → retry → transport)
//!     → caller future resolved
//! ```
//!
//! # Design Decisions
//! - One single-drain worker per endpoint keeps dispatch strictly FIFO
//! - Backpressure is explicit: enqueue never blocks, it rejects or evicts
//! - Cancellation is cooperative: a dropped caller future is skipped at
//!   drain time instead of wasting upstream quota

pub mod dispatcher;
pub mod token_bucket;

pub use dispatcher::{BatchExecutor, EndpointQueue, QueueStats};
pub use token_bucket::TokenBucket;
