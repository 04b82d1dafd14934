//! Per-endpoint owned state: breaker, queue, upstream executor.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::client::types::{UpstreamRequest, UpstreamResponse};
use crate::client::Transport;
use crate::config::{EndpointConfig, GatewayConfig};
use crate::error::GatewayResult;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::queue::dispatcher::BatchExecutor;
use crate::queue::EndpointQueue;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitStatus};
use crate::resilience::{retries, timeouts};

/// Executes drained batches: breaker gate → retry with backoff → transport
/// under the endpoint deadline.
struct UpstreamExecutor {
    config: EndpointConfig,
    breaker: Arc<CircuitBreaker>,
    transport: Arc<dyn Transport>,
}

impl UpstreamExecutor {
    /// Collapse a drained batch into one wire request.
    ///
    /// Single requests pass through untouched; merged batches carry the
    /// member payloads as a JSON array under the first request's path.
    fn merge(requests: &[UpstreamRequest]) -> UpstreamRequest {
        if requests.len() == 1 {
            return requests[0].clone();
        }
        let first = &requests[0];
        let bodies: Vec<serde_json::Value> = requests
            .iter()
            .map(|r| r.body.clone().unwrap_or(serde_json::Value::Null))
            .collect();
        UpstreamRequest {
            id: Uuid::new_v4(),
            method: first.method,
            path: first.path.clone(),
            body: Some(serde_json::Value::Array(bodies)),
            batchable: true,
        }
    }
}

#[async_trait]
impl BatchExecutor for UpstreamExecutor {
    async fn execute(&self, requests: &[UpstreamRequest]) -> GatewayResult<UpstreamResponse> {
        let name = &self.config.name;
        let start = Instant::now();
        if let Err(e) = self.breaker.check() {
            metrics::record_request(name, "circuit_open", start);
            return Err(e);
        }

        let request = Self::merge(requests);
        let deadline = Duration::from_millis(self.config.timeout_ms);

        let result = retries::execute(&self.config.retry, name, || {
            timeouts::with_deadline(name, deadline, self.transport.send(&self.config, &request))
        })
        .await;

        match &result {
            Ok(_) => {
                self.breaker.record_success();
                metrics::record_request(name, "success", start);
            }
            Err(e) if e.counts_toward_circuit() => {
                self.breaker.record_failure();
                metrics::record_request(name, "upstream_failure", start);
            }
            Err(_) => {
                // 4xx: the upstream answered, which is all the breaker
                // cares about.
                self.breaker.record_success();
                metrics::record_request(name, "client_error", start);
            }
        }
        metrics::record_circuit_state(name, self.breaker.current_state());

        result
    }
}

/// Everything the gateway owns for one endpoint.
pub struct EndpointState {
    pub config: EndpointConfig,
    breaker: Arc<CircuitBreaker>,
    queue: Arc<EndpointQueue>,
}

impl EndpointState {
    pub fn new(config: EndpointConfig, transport: Arc<dyn Transport>) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.name.clone(), config.circuit.clone()));
        let executor = Arc::new(UpstreamExecutor {
            config: config.clone(),
            breaker: breaker.clone(),
            transport,
        });
        let queue = Arc::new(EndpointQueue::new(
            config.name.clone(),
            config.queue.clone(),
            executor,
        ));
        Self {
            config,
            breaker,
            queue,
        }
    }

    pub fn queue(&self) -> &Arc<EndpointQueue> {
        &self.queue
    }

    pub fn circuit_status(&self) -> CircuitStatus {
        self.breaker.snapshot()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.config.cache_ttl_ms)
    }
}

/// Registry of per-endpoint state, built once from validated config.
pub struct EndpointRegistry {
    endpoints: HashMap<String, Arc<EndpointState>>,
}

impl EndpointRegistry {
    pub fn from_config(config: &GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        let endpoints = config
            .endpoints
            .iter()
            .map(|ep| {
                (
                    ep.name.clone(),
                    Arc::new(EndpointState::new(ep.clone(), transport.clone())),
                )
            })
            .collect();
        Self { endpoints }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EndpointState>> {
        self.endpoints.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EndpointState>> {
        self.endpoints.values()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Spawn one drain worker per endpoint queue.
    pub fn spawn_workers(&self, shutdown: &Shutdown) {
        for state in self.endpoints.values() {
            tokio::spawn(state.queue.clone().run(shutdown.subscribe()));
        }
    }
}
