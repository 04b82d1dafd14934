//! Dead-letter storage for events that permanently failed delivery.
//!
//! # Responsibilities
//! - Retain failed deliveries for operator inspection and replay
//! - Bound memory: drop-oldest beyond capacity, with a dropped counter

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

use crate::observability::metrics;
use crate::webhook::dispatcher::WebhookEvent;

/// One permanently failed delivery.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    /// The event that could not be delivered.
    pub event: WebhookEvent,
    /// The subscription that exhausted its retries.
    pub subscription: Uuid,
    /// Final error message.
    pub error: String,
    /// Delivery attempts made before giving up.
    pub attempts: u32,
    /// When the delivery was abandoned.
    pub failed_at: Instant,
}

/// Bounded in-memory dead-letter queue.
pub struct DeadLetterQueue {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
    total_captured: AtomicU64,
    total_dropped: AtomicU64,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            total_captured: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    /// Record a failed delivery, evicting the oldest entry at capacity.
    pub fn push(&self, entry: DeadLetter) {
        let mut entries = self.entries.lock().expect("dead-letter mutex poisoned");
        if entries.len() >= self.capacity {
            entries.pop_front();
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }
        entries.push_back(entry);
        self.total_captured.fetch_add(1, Ordering::Relaxed);
        metrics::record_dead_letter_size(entries.len());
    }

    /// Remove and return up to `n` entries for replay.
    pub fn drain(&self, n: usize) -> Vec<DeadLetter> {
        let mut entries = self.entries.lock().expect("dead-letter mutex poisoned");
        let count = n.min(entries.len());
        let drained = entries.drain(..count).collect();
        metrics::record_dead_letter_size(entries.len());
        drained
    }

    /// Inspect up to `n` entries without removing them.
    pub fn peek(&self, n: usize) -> Vec<DeadLetter> {
        let entries = self.entries.lock().expect("dead-letter mutex poisoned");
        entries.iter().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead-letter mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_captured(&self) -> u64 {
        self.total_captured.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(n: u32) -> DeadLetter {
        DeadLetter {
            event: WebhookEvent::new("employee.updated", json!({"seq": n})),
            subscription: Uuid::new_v4(),
            error: "connection refused".into(),
            attempts: 3,
            failed_at: Instant::now(),
        }
    }

    #[test]
    fn test_push_and_len() {
        let dlq = DeadLetterQueue::new(10);
        dlq.push(entry(1));
        assert_eq!(dlq.len(), 1);
        assert!(!dlq.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let dlq = DeadLetterQueue::new(3);
        for n in 0..5 {
            dlq.push(entry(n));
        }

        assert_eq!(dlq.len(), 3);
        assert_eq!(dlq.total_captured(), 5);
        assert_eq!(dlq.total_dropped(), 2);

        let remaining = dlq.drain(10);
        assert_eq!(remaining[0].event.payload["seq"], 2);
        assert_eq!(remaining[2].event.payload["seq"], 4);
    }

    #[test]
    fn test_drain_removes_peek_does_not() {
        let dlq = DeadLetterQueue::new(10);
        for n in 0..4 {
            dlq.push(entry(n));
        }

        assert_eq!(dlq.peek(2).len(), 2);
        assert_eq!(dlq.len(), 4);

        assert_eq!(dlq.drain(3).len(), 3);
        assert_eq!(dlq.len(), 1);
    }
}
