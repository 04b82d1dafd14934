//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway::fetch
//!     → store.rs (TTL lookup; hit returns immediately)
//!     → on miss: single_flight.rs (coalesce concurrent refills per key)
//!     → queue/breaker/retry pipeline fetches once
//!     → store.rs (populate with endpoint TTL)
//! ```
//!
//! # Design Decisions
//! - Expiry is checked on the read path; a background sweeper reclaims
//!   entries nobody reads again
//! - At most one concurrent refill per key; every waiter gets the leader's
//!   result, success or failure
//! - The store is generic over the value so tests exercise it directly

pub mod single_flight;
pub mod store;

pub use single_flight::SingleFlight;
pub use store::{CacheStats, CacheStore};
