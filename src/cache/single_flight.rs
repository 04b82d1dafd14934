//! Concurrent-refill coalescing ("thundering herd" guard).
//!
//! # Responsibilities
//! - Guarantee at most one in-flight refill per cache key
//! - Hand every concurrent waiter the leader's result, success or failure
//! - Never strand waiters: a cancelled leader resolves them with Canceled

use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::future::Future;
use tokio::sync::broadcast;

use crate::error::{GatewayError, GatewayResult};

type FlightSender<V> = broadcast::Sender<GatewayResult<V>>;

/// Per-key coalescing of concurrent refills.
pub struct SingleFlight<V> {
    in_flight: DashMap<String, FlightSender<V>>,
}

impl<V: Clone + Send + 'static> SingleFlight<V> {
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Number of refills currently in flight (diagnostic).
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run `fetch` for this key, unless another caller already is — then
    /// wait for that caller's result instead.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> GatewayResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = GatewayResult<V>>,
    {
        let follower_rx = match self.in_flight.entry(key.to_string()) {
            MapEntry::Occupied(entry) => Some(entry.get().subscribe()),
            MapEntry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx);
                None
            }
        };

        if let Some(mut rx) = follower_rx {
            return match rx.recv().await {
                Ok(result) => result,
                // Leader dropped without publishing (cancelled mid-flight).
                Err(_) => Err(GatewayError::Canceled),
            };
        }

        // Leader path. The guard unregisters the flight even if this future
        // is dropped, so followers wake up instead of hanging.
        let guard = FlightGuard {
            in_flight: &self.in_flight,
            key,
        };
        let result = fetch().await;
        guard.publish(result.clone());
        result
    }
}

impl<V: Clone + Send + 'static> Default for SingleFlight<V> {
    fn default() -> Self {
        Self::new()
    }
}

struct FlightGuard<'a, V> {
    in_flight: &'a DashMap<String, FlightSender<V>>,
    key: &'a str,
}

impl<V: Clone> FlightGuard<'_, V> {
    /// Unregister the flight, then broadcast to subscribed followers.
    ///
    /// Removal happens first so a caller arriving after this point starts a
    /// fresh flight rather than waiting on a completed one.
    fn publish(self, result: GatewayResult<V>) {
        if let Some((_, tx)) = self.in_flight.remove(self.key) {
            let _ = tx.send(result);
        }
        std::mem::forget(self);
    }
}

impl<V> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        // Leader cancelled: dropping the sender resolves followers with
        // a recv error, surfaced as Canceled.
        self.in_flight.remove(self.key);
    }
}
