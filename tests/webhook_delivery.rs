//! End-to-end tests for webhook fan-out: retries, dead-lettering, ordering
//! and operator replay.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use integration_gateway::config::schema::WebhookConfig;
use integration_gateway::config::RetryPolicyConfig;
use integration_gateway::{EventHandler, GatewayError, GatewayResult, WebhookDispatcher, WebhookEvent};

fn fast_retry(max_retries: u32) -> RetryPolicyConfig {
    RetryPolicyConfig {
        max_retries,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
    }
}

fn dispatcher() -> WebhookDispatcher {
    WebhookDispatcher::new(WebhookConfig {
        dead_letter_capacity: 100,
        default_retry: fast_retry(2),
    })
}

/// Fails the first `fail_first` calls with a transient error.
struct FlakyConsumer {
    calls: AtomicU32,
    fail_first: u32,
}

impl FlakyConsumer {
    fn new(fail_first: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail_first,
        })
    }
}

#[async_trait]
impl EventHandler for FlakyConsumer {
    async fn handle(&self, _event: &WebhookEvent) -> GatewayResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(GatewayError::Network {
                endpoint: "hr-portal".into(),
                reason: "connection refused".into(),
            })
        } else {
            Ok(())
        }
    }
}

/// Records every payload it sees, in order.
struct Ledger {
    seen: Mutex<Vec<serde_json::Value>>,
}

impl Ledger {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl EventHandler for Ledger {
    async fn handle(&self, event: &WebhookEvent) -> GatewayResult<()> {
        self.seen.lock().unwrap().push(event.payload.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_flaky_consumer_recovers_within_retry_budget() {
    let dispatcher = dispatcher();
    let consumer = FlakyConsumer::new(2);
    dispatcher.register("contract.approved", consumer.clone(), Some(fast_retry(3)));

    let receipt = dispatcher.dispatch(WebhookEvent::new("contract.approved", json!({"id": 7})));
    let outcomes = receipt.await_all().await;

    assert!(outcomes[0].1.is_ok());
    assert_eq!(consumer.calls.load(Ordering::SeqCst), 3);
    assert!(dispatcher.dead_letters().is_empty());
    assert_eq!(dispatcher.delivered(), 1);
}

#[tokio::test]
async fn test_dead_letter_exactly_once_then_later_events_flow() {
    let dispatcher = dispatcher();
    let consumer = FlakyConsumer::new(3); // fails 3 times; budget allows 3 attempts
    let sub = dispatcher.register("contract.approved", consumer.clone(), Some(fast_retry(2)));

    let receipt = dispatcher.dispatch(WebhookEvent::new("contract.approved", json!({"id": 1})));
    let outcomes = receipt.await_all().await;

    match &outcomes[0].1 {
        Err(GatewayError::DeliveryFailed { subscription, attempts, .. }) => {
            assert_eq!(*subscription, sub);
            assert_eq!(*attempts, 3);
        }
        other => panic!("expected DeliveryFailed, got {other:?}"),
    }
    assert_eq!(dispatcher.dead_letters().len(), 1);
    assert_eq!(dispatcher.failed(), 1);

    // The consumer has recovered; the next event goes through and the
    // dead-lettered one stays where it is.
    let receipt = dispatcher.dispatch(WebhookEvent::new("contract.approved", json!({"id": 2})));
    let outcomes = receipt.await_all().await;
    assert!(outcomes[0].1.is_ok());
    assert_eq!(dispatcher.dead_letters().len(), 1);
    assert_eq!(dispatcher.dead_letters().total_captured(), 1);
}

#[tokio::test]
async fn test_one_bad_subscriber_does_not_block_others() {
    let dispatcher = dispatcher();
    let healthy = Ledger::new();
    let broken = FlakyConsumer::new(u32::MAX);
    dispatcher.register("payroll.run", healthy.clone(), None);
    dispatcher.register("payroll.run", broken, Some(fast_retry(1)));

    let receipt = dispatcher.dispatch(WebhookEvent::new("payroll.run", json!({"month": "06"})));
    let outcomes = receipt.await_all().await;

    let ok_count = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
    assert_eq!(ok_count, 1);
    assert_eq!(healthy.seen.lock().unwrap().len(), 1);
    assert_eq!(dispatcher.dead_letters().len(), 1);
}

#[tokio::test]
async fn test_event_order_preserved_per_subscriber() {
    let dispatcher = dispatcher();
    let ledger = Ledger::new();
    dispatcher.register("employee.updated", ledger.clone(), None);

    let mut receipts = Vec::new();
    for n in 0..10 {
        receipts.push(dispatcher.dispatch(WebhookEvent::new("employee.updated", json!(n))));
    }
    for receipt in receipts {
        receipt.await_all().await;
    }

    let seen = ledger.seen.lock().unwrap().clone();
    let expected: Vec<_> = (0..10).map(|n| json!(n)).collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_operator_replay_from_dead_letters() {
    let dispatcher = dispatcher();
    let consumer = FlakyConsumer::new(3);
    dispatcher.register("contract.approved", consumer.clone(), Some(fast_retry(2)));

    let receipt = dispatcher.dispatch(WebhookEvent::new("contract.approved", json!({"id": 9})));
    let _ = receipt.await_all().await;
    assert_eq!(dispatcher.dead_letters().len(), 1);

    // Operator drains the dead letters and re-dispatches them; the
    // consumer has recovered by now.
    let stranded = dispatcher.dead_letters().drain(10);
    assert_eq!(stranded.len(), 1);
    for entry in stranded {
        let receipt = dispatcher.dispatch(entry.event);
        let outcomes = receipt.await_all().await;
        assert!(outcomes[0].1.is_ok());
    }
    assert!(dispatcher.dead_letters().is_empty());
}
