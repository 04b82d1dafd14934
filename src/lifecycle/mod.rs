//! Lifecycle coordination.
//!
//! # Design Decisions
//! - A single broadcast channel fans the shutdown signal out to every
//!   long-running worker (queue drains, cache sweeper, admin server)
//! - Workers exit their loops cooperatively; nothing is aborted mid-dispatch

pub mod shutdown;

pub use shutdown::Shutdown;
