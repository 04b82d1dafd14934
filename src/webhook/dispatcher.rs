//! Webhook subscription registry and delivery workers.
//!
//! # Responsibilities
//! - Register/unregister subscriptions per event type
//! - Deliver events to every matching subscription, retrying transient
//!   handler failures with the shared backoff semantics
//! - Dead-letter an event exactly once after a subscription exhausts its
//!   attempts, and report the failure to the dispatching caller

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::config::schema::WebhookConfig;
use crate::config::RetryPolicyConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::observability::metrics;
use crate::resilience::retries;
use crate::webhook::dead_letter::{DeadLetter, DeadLetterQueue};

/// One inbound event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl WebhookEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            payload,
        }
    }
}

/// Consumer callback for delivered events.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: &WebhookEvent) -> GatewayResult<()>;
}

struct Delivery {
    event: WebhookEvent,
    result_tx: oneshot::Sender<GatewayResult<()>>,
}

struct Subscription {
    event_type: String,
    tx: mpsc::UnboundedSender<Delivery>,
}

/// Handle on one delivery's outcome.
pub struct DeliveryHandle {
    pub subscription: Uuid,
    rx: oneshot::Receiver<GatewayResult<()>>,
}

impl DeliveryHandle {
    /// Wait for this delivery to finish (including retries).
    pub async fn result(self) -> GatewayResult<()> {
        self.rx.await.unwrap_or(Err(GatewayError::Canceled))
    }
}

/// Per-dispatch receipt: one result future per matched subscription.
pub struct DispatchReceipt {
    pub event_id: Uuid,
    pub deliveries: Vec<DeliveryHandle>,
}

impl DispatchReceipt {
    pub fn matched(&self) -> usize {
        self.deliveries.len()
    }

    /// Wait for every matched delivery, returning per-subscription outcomes.
    pub async fn await_all(self) -> Vec<(Uuid, GatewayResult<()>)> {
        let futures = self.deliveries.into_iter().map(|handle| {
            let id = handle.subscription;
            async move { (id, handle.result().await) }
        });
        join_all(futures).await
    }
}

/// Registry of webhook subscriptions plus their delivery workers.
pub struct WebhookDispatcher {
    subscriptions: DashMap<Uuid, Subscription>,
    dead_letters: Arc<DeadLetterQueue>,
    default_retry: RetryPolicyConfig,
    delivered: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            subscriptions: DashMap::new(),
            dead_letters: Arc::new(DeadLetterQueue::new(config.dead_letter_capacity)),
            default_retry: config.default_retry,
            delivered: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Register a handler for an event type. Returns the subscription id.
    ///
    /// Each subscription gets its own FIFO worker, so one slow consumer
    /// never delays another and per-subscriber event order is preserved.
    pub fn register(
        &self,
        event_type: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        retry: Option<RetryPolicyConfig>,
    ) -> Uuid {
        let event_type = event_type.into();
        let id = Uuid::new_v4();
        let retry = retry.unwrap_or_else(|| self.default_retry.clone());
        let (tx, rx) = mpsc::unbounded_channel();

        self.subscriptions.insert(
            id,
            Subscription {
                event_type: event_type.clone(),
                tx,
            },
        );

        tracing::info!(subscription = %id, event_type = %event_type, "Webhook subscription registered");
        tokio::spawn(delivery_worker(WorkerContext {
            subscription: id,
            handler,
            retry,
            rx,
            dead_letters: self.dead_letters.clone(),
            delivered: self.delivered.clone(),
            failed: self.failed.clone(),
        }));

        id
    }

    /// Remove a subscription. Its worker exits after finishing the
    /// deliveries already queued to it.
    pub fn unregister(&self, id: Uuid) -> bool {
        let removed = self.subscriptions.remove(&id).is_some();
        if removed {
            tracing::info!(subscription = %id, "Webhook subscription removed");
        }
        removed
    }

    /// Deliver an event to every subscription matching its type.
    ///
    /// Returns immediately with one result future per matched subscription;
    /// deliveries proceed concurrently across subscribers.
    pub fn dispatch(&self, event: WebhookEvent) -> DispatchReceipt {
        let mut deliveries = Vec::new();

        for entry in self.subscriptions.iter() {
            if entry.value().event_type != event.event_type {
                continue;
            }
            let (result_tx, result_rx) = oneshot::channel();
            let delivery = Delivery {
                event: event.clone(),
                result_tx,
            };
            if entry.value().tx.send(delivery).is_ok() {
                deliveries.push(DeliveryHandle {
                    subscription: *entry.key(),
                    rx: result_rx,
                });
            }
        }

        if deliveries.is_empty() {
            tracing::debug!(event_type = %event.event_type, "No subscriptions matched event");
        }

        DispatchReceipt {
            event_id: event.id,
            deliveries,
        }
    }

    pub fn dead_letters(&self) -> &Arc<DeadLetterQueue> {
        &self.dead_letters
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

struct WorkerContext {
    subscription: Uuid,
    handler: Arc<dyn EventHandler>,
    retry: RetryPolicyConfig,
    rx: mpsc::UnboundedReceiver<Delivery>,
    dead_letters: Arc<DeadLetterQueue>,
    delivered: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

async fn delivery_worker(mut ctx: WorkerContext) {
    let subscription = ctx.subscription;
    let label = format!("webhook:{subscription}");

    // Deliveries are processed one at a time: retries for event N finish
    // (or dead-letter) before event N+1 starts, preserving original order.
    while let Some(delivery) = ctx.rx.recv().await {
        let event = delivery.event;

        let result = retries::execute(&ctx.retry, &label, || ctx.handler.handle(&event)).await;

        let outcome = match result {
            Ok(()) => {
                ctx.delivered.fetch_add(1, Ordering::Relaxed);
                metrics::record_webhook_delivery(&event.event_type, true);
                Ok(())
            }
            Err(err) => {
                let attempts = match &err {
                    GatewayError::RetryExhausted { attempts, .. } => *attempts,
                    _ => 1,
                };
                tracing::warn!(
                    subscription = %subscription,
                    event = %event.id,
                    event_type = %event.event_type,
                    attempts,
                    error = %err,
                    "Webhook delivery failed, dead-lettering event"
                );
                ctx.dead_letters.push(DeadLetter {
                    event: event.clone(),
                    subscription,
                    error: err.to_string(),
                    attempts,
                    failed_at: Instant::now(),
                });
                ctx.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_webhook_delivery(&event.event_type, false);
                Err(GatewayError::DeliveryFailed {
                    subscription,
                    attempts,
                    source: Box::new(err),
                })
            }
        };

        let _ = delivery.result_tx.send(outcome);
    }

    tracing::debug!(subscription = %subscription, "Delivery worker exiting");
}
