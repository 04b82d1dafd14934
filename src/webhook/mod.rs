//! Inbound webhook fan-out subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch(event)
//!     → subscription registry (match by event type)
//!     → per-subscription FIFO worker (preserves per-subscriber order)
//!     → handler, retried with backoff on transient failure
//!     → on exhaustion: dead_letter.rs (exactly once) + DeliveryFailed
//! ```
//!
//! # Design Decisions
//! - One worker per subscription: cross-subscriber order is unspecified,
//!   per-subscriber order is strict
//! - Every dispatch hands the caller one result future per matched
//!   subscription instead of a callback chain
//! - Dead-lettered events are never retried by later dispatches

pub mod dead_letter;
pub mod dispatcher;

pub use dead_letter::{DeadLetter, DeadLetterQueue};
pub use dispatcher::{DispatchReceipt, EventHandler, WebhookDispatcher, WebhookEvent};
