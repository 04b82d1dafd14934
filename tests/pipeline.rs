//! End-to-end tests for the outbound resilience pipeline, driving the real
//! HTTP transport against programmable mock upstreams.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use integration_gateway::client::HttpTransport;
use integration_gateway::config::schema::{
    CircuitBreakerConfig, EndpointConfig, GatewayConfig, QueueConfig,
};
use integration_gateway::config::{OverflowPolicy, RetryPolicyConfig};
use integration_gateway::{Gateway, GatewayError, Shutdown, UpstreamRequest};

mod common;

fn endpoint_config(name: &str, addr: std::net::SocketAddr) -> EndpointConfig {
    EndpointConfig {
        name: name.to_string(),
        base_url: format!("http://{addr}"),
        timeout_ms: 2000,
        cache_ttl_ms: 0,
        retry: RetryPolicyConfig {
            max_retries: 2,
            base_delay_ms: 10,
            max_delay_ms: 50,
            jitter: false,
        },
        circuit: CircuitBreakerConfig {
            failure_threshold: 5,
            window_ms: 60_000,
            open_cooldown_ms: 60_000,
        },
        queue: QueueConfig {
            capacity: 32,
            overflow: OverflowPolicy::RejectNew,
            rate_limit_requests: 1000,
            rate_limit_window_ms: 1000,
            batching: None,
        },
    }
}

fn build_gateway(endpoint: EndpointConfig) -> (Arc<Gateway>, Shutdown) {
    let config = GatewayConfig {
        endpoints: vec![endpoint],
        ..Default::default()
    };
    let gateway = Arc::new(Gateway::new(&config, Arc::new(HttpTransport::new())));
    let shutdown = Shutdown::new();
    gateway.spawn_workers(&shutdown);
    (gateway, shutdown)
}

#[tokio::test]
async fn test_fetch_resolves_against_real_upstream() {
    let addr = common::start_mock_upstream(r#"{"employees": []}"#).await;
    let (gateway, shutdown) = build_gateway(endpoint_config("qiwa", addr));

    let response = gateway
        .fetch("qiwa", UpstreamRequest::get("/employees"))
        .await
        .expect("Upstream unreachable");

    assert_eq!(response.status, 200);
    assert_eq!(response.body["employees"], serde_json::json!([]));
    shutdown.trigger();
}

#[tokio::test]
async fn test_retry_recovers_from_transient_upstream_failures() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_upstream(move || {
        let cc = cc.clone();
        async move {
            let count = cc.fetch_add(1, Ordering::SeqCst);
            if count < 2 {
                (503, r#"{"error": "unavailable"}"#.to_string())
            } else {
                (200, r#"{"ok": true}"#.to_string())
            }
        }
    })
    .await;

    let (gateway, shutdown) = build_gateway(endpoint_config("qiwa", addr));

    let response = gateway
        .fetch("qiwa", UpstreamRequest::get("/verify"))
        .await
        .expect("Should eventually succeed after retries");

    assert_eq!(response.status, 200);
    assert_eq!(call_count.load(Ordering::SeqCst), 3, "Should have attempted 3 times");
    shutdown.trigger();
}

#[tokio::test]
async fn test_client_error_surfaces_without_retry() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_upstream(move || {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (422, r#"{"error": "invalid iqama"}"#.to_string())
        }
    })
    .await;

    let (gateway, shutdown) = build_gateway(endpoint_config("moi", addr));

    let err = gateway
        .fetch("moi", UpstreamRequest::get("/verify"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::Client { status: 422, .. }));
    assert_eq!(call_count.load(Ordering::SeqCst), 1, "4xx must not be retried");
    shutdown.trigger();
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_failures() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_upstream(move || {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (500, r#"{"error": "boom"}"#.to_string())
        }
    })
    .await;

    let mut endpoint = endpoint_config("moi", addr);
    endpoint.retry.max_retries = 0;
    endpoint.circuit.failure_threshold = 3;
    let (gateway, shutdown) = build_gateway(endpoint);

    for _ in 0..3 {
        let err = gateway.fetch("moi", UpstreamRequest::get("/x")).await.unwrap_err();
        assert!(err.is_transient(), "pre-threshold failures surface as upstream errors");
    }

    let status = gateway.circuit_status("moi").expect("endpoint exists");
    assert!(status.retry_after_ms.is_some(), "circuit should be open");

    let calls_before = call_count.load(Ordering::SeqCst);
    let err = gateway.fetch("moi", UpstreamRequest::get("/x")).await.unwrap_err();
    match err {
        GatewayError::CircuitOpen { retry_after_ms, .. } => assert!(retry_after_ms > 0),
        other => panic!("expected CircuitOpen, got {other}"),
    }
    assert_eq!(
        call_count.load(Ordering::SeqCst),
        calls_before,
        "open circuit must not touch the upstream"
    );
    shutdown.trigger();
}

#[tokio::test]
async fn test_cache_suppresses_repeat_upstream_calls() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_upstream(move || {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (200, r#"{"balance": 100}"#.to_string())
        }
    })
    .await;

    let mut endpoint = endpoint_config("qiwa", addr);
    endpoint.cache_ttl_ms = 60_000;
    let (gateway, shutdown) = build_gateway(endpoint);

    for _ in 0..5 {
        let response = gateway
            .fetch("qiwa", UpstreamRequest::get("/balance"))
            .await
            .unwrap();
        assert_eq!(response.body["balance"], 100);
    }

    assert_eq!(call_count.load(Ordering::SeqCst), 1, "only the first fetch hits upstream");
    assert_eq!(gateway.cache_stats().hits, 4);
    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_misses_coalesce_into_one_call() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_programmable_upstream(move || {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            (200, r#"{"ok": true}"#.to_string())
        }
    })
    .await;

    let mut endpoint = endpoint_config("qiwa", addr);
    endpoint.cache_ttl_ms = 60_000;
    let (gateway, shutdown) = build_gateway(endpoint);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gateway = gateway.clone();
        handles.push(tokio::spawn(async move {
            gateway.fetch("qiwa", UpstreamRequest::get("/herd")).await
        }));
    }
    for handle in handles {
        let response = handle.await.unwrap().expect("all waiters share the result");
        assert_eq!(response.body["ok"], true);
    }

    assert_eq!(call_count.load(Ordering::SeqCst), 1, "stampede guard held");
    shutdown.trigger();
}

#[tokio::test]
async fn test_full_queue_rejects_new_requests() {
    // Slow upstream keeps the worker busy while the queue fills.
    let addr = common::start_programmable_upstream(|| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, r#"{"ok": true}"#.to_string())
    })
    .await;

    let mut endpoint = endpoint_config("moi", addr);
    endpoint.queue.capacity = 1;
    endpoint.retry.max_retries = 0;
    let (gateway, shutdown) = build_gateway(endpoint);

    let g1 = gateway.clone();
    let in_flight = tokio::spawn(async move { g1.fetch("moi", UpstreamRequest::get("/a")).await });
    // Let the worker pick up the first request.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let g2 = gateway.clone();
    let queued = tokio::spawn(async move { g2.fetch("moi", UpstreamRequest::get("/b")).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = gateway.fetch("moi", UpstreamRequest::get("/c")).await.unwrap_err();
    assert!(matches!(err, GatewayError::QueueFull { .. }));

    assert!(in_flight.await.unwrap().is_ok());
    assert!(queued.await.unwrap().is_ok());
    shutdown.trigger();
}

#[tokio::test]
async fn test_gateway_built_from_toml_config() {
    let addr = common::start_mock_upstream(r#"{"ok": true}"#).await;
    let raw = format!(
        r#"
        [[endpoints]]
        name = "moi"
        base_url = "http://{addr}"
        cache_ttl_ms = 60000
        "#
    );
    let config: GatewayConfig = toml::from_str(&raw).unwrap();
    integration_gateway::config::validation::validate_config(&config).unwrap();

    let gateway = Gateway::new(&config, Arc::new(HttpTransport::new()));
    let shutdown = Shutdown::new();
    gateway.spawn_workers(&shutdown);

    let response = gateway.fetch("moi", UpstreamRequest::get("/ping")).await.unwrap();
    assert_eq!(response.status, 200);
    shutdown.trigger();
}
