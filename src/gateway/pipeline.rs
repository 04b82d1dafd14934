//! The caller-facing pipeline.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheStats, CacheStore, SingleFlight};
use crate::client::types::{UpstreamRequest, UpstreamResponse};
use crate::client::Transport;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::endpoint::{EndpointRegistry, EndpointState};
use crate::lifecycle::Shutdown;
use crate::queue::QueueStats;
use crate::resilience::circuit_breaker::CircuitStatus;

/// Single entry point combining cache, queue, circuit breaker and retry.
pub struct Gateway {
    registry: EndpointRegistry,
    cache: Arc<CacheStore<Arc<UpstreamResponse>>>,
    flights: SingleFlight<Arc<UpstreamResponse>>,
    sweep_interval_ms: u64,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: EndpointRegistry::from_config(config, transport),
            cache: Arc::new(CacheStore::new()),
            flights: SingleFlight::new(),
            sweep_interval_ms: config.cache.sweep_interval_ms,
        }
    }

    /// Spawn the queue drain workers and the cache sweeper.
    pub fn spawn_workers(&self, shutdown: &Shutdown) {
        self.registry.spawn_workers(shutdown);
        tokio::spawn(self.cache.clone().run_sweeper(
            std::time::Duration::from_millis(self.sweep_interval_ms),
            shutdown.subscribe(),
        ));
    }

    /// Fetch through the full resilience pipeline.
    ///
    /// Cache hits return immediately; concurrent misses for the same key
    /// coalesce into a single upstream call. Responses from batched
    /// dispatches are shared, hence the `Arc`.
    pub async fn fetch(
        &self,
        endpoint: &str,
        request: UpstreamRequest,
    ) -> GatewayResult<Arc<UpstreamResponse>> {
        let state = self
            .registry
            .get(endpoint)
            .ok_or_else(|| GatewayError::UnknownEndpoint(endpoint.to_string()))?
            .clone();

        let ttl = state.cache_ttl();
        if ttl.is_zero() {
            // Uncacheable endpoint: no key to coalesce on either.
            return Self::dispatch(&state, request).await;
        }

        let key = request.cache_key(endpoint);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(endpoint = %endpoint, key = %key, "Cache hit");
            return Ok(hit);
        }

        let cache = self.cache.clone();
        let cache_key = key.clone();
        self.flights
            .run(&key, || async move {
                let response = Self::dispatch(&state, request).await?;
                cache.set(cache_key, response.clone(), ttl);
                Ok(response)
            })
            .await
    }

    async fn dispatch(
        state: &Arc<EndpointState>,
        request: UpstreamRequest,
    ) -> GatewayResult<Arc<UpstreamResponse>> {
        let started = Instant::now();
        let rx = state.queue().enqueue(request)?;
        let result = rx.await.unwrap_or(Err(GatewayError::Canceled))?;
        tracing::debug!(
            endpoint = %state.config.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(result)
    }

    /// Read-only circuit diagnostic for one endpoint.
    pub fn circuit_status(&self, endpoint: &str) -> Option<CircuitStatus> {
        self.registry.get(endpoint).map(|s| s.circuit_status())
    }

    /// Circuit diagnostics for every endpoint.
    pub fn circuit_statuses(&self) -> Vec<CircuitStatus> {
        let mut statuses: Vec<_> = self.registry.iter().map(|s| s.circuit_status()).collect();
        statuses.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        statuses
    }

    /// Queue statistics for every endpoint.
    pub fn queue_stats(&self) -> Vec<QueueStats> {
        let mut stats: Vec<_> = self.registry.iter().map(|s| s.queue().stats()).collect();
        stats.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        stats
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Remove one cached entry.
    pub fn invalidate(&self, key: &str) -> bool {
        self.cache.invalidate(key)
    }

    /// Remove every cached entry whose key starts with `prefix`; an
    /// endpoint name invalidates that endpoint's whole slice of the cache.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.cache.invalidate_prefix(prefix)
    }
}
