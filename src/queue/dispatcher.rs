//! Per-endpoint request queue and drain worker.
//!
//! # Responsibilities
//! - Bounded FIFO buffering of outbound requests per endpoint
//! - Fail-fast backpressure (reject-new) or drop-oldest eviction
//! - Token-bucket-paced dispatch preserving enqueue order
//! - Optional coalescing of consecutive batchable requests

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{broadcast, oneshot, Notify};
use uuid::Uuid;

use crate::client::types::{UpstreamRequest, UpstreamResponse};
use crate::config::schema::QueueConfig;
use crate::config::OverflowPolicy;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::queue::token_bucket::TokenBucket;

/// Result delivered to a queued caller.
pub type DispatchResult = GatewayResult<Arc<UpstreamResponse>>;

/// Executes a drained batch against the upstream (breaker → retry →
/// transport). Implemented by the gateway's per-endpoint state.
#[async_trait]
pub trait BatchExecutor: Send + Sync + 'static {
    async fn execute(&self, requests: &[UpstreamRequest]) -> GatewayResult<UpstreamResponse>;
}

struct QueuedRequest {
    id: Uuid,
    request: UpstreamRequest,
    enqueued_at: Instant,
    tx: oneshot::Sender<DispatchResult>,
}

/// Counters exposed through the admin surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub endpoint: String,
    pub depth: usize,
    pub capacity: usize,
    pub enqueued: u64,
    pub dispatched: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub canceled: u64,
}

/// Bounded FIFO queue for one endpoint, drained by a single worker.
pub struct EndpointQueue {
    endpoint: String,
    config: QueueConfig,
    pending: Mutex<VecDeque<QueuedRequest>>,
    bucket: Mutex<TokenBucket>,
    notify: Notify,
    executor: Arc<dyn BatchExecutor>,
    enqueued: AtomicU64,
    dispatched: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
    canceled: AtomicU64,
}

impl EndpointQueue {
    pub fn new(endpoint: impl Into<String>, config: QueueConfig, executor: Arc<dyn BatchExecutor>) -> Self {
        let bucket = TokenBucket::new(
            config.rate_limit_requests,
            std::time::Duration::from_millis(config.rate_limit_window_ms),
        );
        Self {
            endpoint: endpoint.into(),
            config,
            pending: Mutex::new(VecDeque::new()),
            bucket: Mutex::new(bucket),
            notify: Notify::new(),
            executor,
            enqueued: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            canceled: AtomicU64::new(0),
        }
    }

    /// Queue a request for dispatch.
    ///
    /// Returns a future resolved when the request completes or is dropped.
    /// Never blocks: a full queue either rejects the new request or evicts
    /// the oldest pending one, per the endpoint's overflow policy.
    pub fn enqueue(&self, request: UpstreamRequest) -> GatewayResult<oneshot::Receiver<DispatchResult>> {
        let (tx, rx) = oneshot::channel();
        let queued = QueuedRequest {
            id: request.id,
            request,
            enqueued_at: Instant::now(),
            tx,
        };

        {
            let mut pending = self.pending.lock().expect("queue mutex poisoned");
            if pending.len() >= self.config.capacity {
                match self.config.overflow {
                    OverflowPolicy::RejectNew => {
                        self.rejected.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            endpoint = %self.endpoint,
                            depth = pending.len(),
                            "Queue full, rejecting request"
                        );
                        return Err(GatewayError::QueueFull {
                            endpoint: self.endpoint.clone(),
                        });
                    }
                    OverflowPolicy::DropOldest => {
                        if let Some(oldest) = pending.pop_front() {
                            self.evicted.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(
                                endpoint = %self.endpoint,
                                evicted = %oldest.id,
                                "Queue full, evicting oldest request"
                            );
                            let _ = oldest.tx.send(Err(GatewayError::QueueFull {
                                endpoint: self.endpoint.clone(),
                            }));
                        }
                    }
                }
            }
            pending.push_back(queued);
            self.enqueued.fetch_add(1, Ordering::Relaxed);
            metrics::record_queue_depth(&self.endpoint, pending.len());
        }

        self.notify.notify_one();
        Ok(rx)
    }

    pub fn depth(&self) -> usize {
        self.pending.lock().expect("queue mutex poisoned").len()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            endpoint: self.endpoint.clone(),
            depth: self.depth(),
            capacity: self.config.capacity,
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            canceled: self.canceled.load(Ordering::Relaxed),
        }
    }

    /// Drain loop. One instance per endpoint; FIFO order is preserved
    /// because dispatches are awaited one batch at a time.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            endpoint = %self.endpoint,
            capacity = self.config.capacity,
            rate = self.config.rate_limit_requests,
            window_ms = self.config.rate_limit_window_ms,
            "Queue worker starting"
        );

        loop {
            if self.depth() == 0 {
                tokio::select! {
                    _ = self.notify.notified() => continue,
                    _ = shutdown.recv() => break,
                }
            }

            let wait = {
                let mut bucket = self.bucket.lock().expect("bucket mutex poisoned");
                if bucket.try_acquire() {
                    None
                } else {
                    Some(bucket.next_available())
                }
            };
            if let Some(delay) = wait {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => continue,
                    _ = shutdown.recv() => break,
                }
            }

            let batch = self.pop_batch();
            if batch.is_empty() {
                continue;
            }
            self.dispatch(batch).await;
        }

        self.drain_on_shutdown();
        tracing::info!(endpoint = %self.endpoint, "Queue worker stopped");
    }

    /// Pop the next request, skipping entries whose caller went away, and
    /// coalesce consecutive batchable requests when batching is enabled.
    fn pop_batch(&self) -> Vec<QueuedRequest> {
        let mut pending = self.pending.lock().expect("queue mutex poisoned");
        let mut batch = Vec::new();

        let head = loop {
            match pending.pop_front() {
                Some(entry) if entry.tx.is_closed() => {
                    self.canceled.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(endpoint = %self.endpoint, request = %entry.id, "Skipping canceled request");
                }
                Some(entry) => break Some(entry),
                None => break None,
            }
        };
        let Some(head) = head else {
            metrics::record_queue_depth(&self.endpoint, pending.len());
            return batch;
        };

        let max_size = match &self.config.batching {
            Some(batching) if head.request.batchable => batching.max_size,
            _ => 1,
        };
        batch.push(head);

        while batch.len() < max_size {
            let (closed, batchable) = match pending.front() {
                Some(next) => (next.tx.is_closed(), next.request.batchable),
                None => break,
            };
            if closed {
                if pending.pop_front().is_some() {
                    self.canceled.fetch_add(1, Ordering::Relaxed);
                }
            } else if batchable {
                if let Some(entry) = pending.pop_front() {
                    batch.push(entry);
                }
            } else {
                break;
            }
        }

        metrics::record_queue_depth(&self.endpoint, pending.len());
        batch
    }

    async fn dispatch(&self, batch: Vec<QueuedRequest>) {
        let requests: Vec<UpstreamRequest> = batch.iter().map(|q| q.request.clone()).collect();
        let queue_wait = batch
            .first()
            .map(|q| q.enqueued_at.elapsed())
            .unwrap_or_default();

        tracing::debug!(
            endpoint = %self.endpoint,
            batch_size = batch.len(),
            queue_wait_ms = queue_wait.as_millis() as u64,
            "Dispatching"
        );

        let result = self.executor.execute(&requests).await;
        self.dispatched.fetch_add(batch.len() as u64, Ordering::Relaxed);

        let shared = result.map(Arc::new);
        for entry in batch {
            let _ = entry.tx.send(shared.clone());
        }
    }

    /// Resolve everything still pending so callers are not left hanging.
    fn drain_on_shutdown(&self) {
        let mut pending = self.pending.lock().expect("queue mutex poisoned");
        let remaining = pending.len();
        for entry in pending.drain(..) {
            let _ = entry.tx.send(Err(GatewayError::Canceled));
        }
        if remaining > 0 {
            tracing::warn!(
                endpoint = %self.endpoint,
                drained = remaining,
                "Queue shutdown with pending requests"
            );
        }
    }
}
