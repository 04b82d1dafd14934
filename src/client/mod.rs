//! Outbound client subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamRequest
//!     → transport.rs (Transport trait, HTTP implementation)
//!     → UpstreamResponse | GatewayError
//! ```
//!
//! # Design Decisions
//! - The Transport trait is the only seam that touches the network; the
//!   pipeline never sees a concrete HTTP client
//! - Error classification (transient vs. client) happens at this boundary
//! - Tests inject scripted transports instead of real sockets

pub mod transport;
pub mod types;

pub use transport::{HttpTransport, Transport};
pub use types::{HttpMethod, UpstreamRequest, UpstreamResponse};
