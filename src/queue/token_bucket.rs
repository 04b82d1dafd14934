//! Token bucket pacing for the queue drain loop.

use std::time::{Duration, Instant};

/// A simple token bucket.
///
/// The drain worker asks for one token per dispatch; when the bucket is
/// empty it sleeps for `next_available` instead of rejecting, so pacing
/// never drops requests.
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_update: Instant,
}

impl TokenBucket {
    /// Bucket allowing `requests` dispatches per `window`.
    pub fn new(requests: u32, window: Duration) -> Self {
        let capacity = requests as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            last_update: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_update = now;
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token will be available.
    pub fn next_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        let deficit = 1.0 - self.tokens;
        Duration::from_secs_f64(deficit / self.refill_per_sec)
    }
}
