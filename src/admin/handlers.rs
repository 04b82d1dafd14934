use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;
use crate::queue::QueueStats;
use crate::resilience::circuit_breaker::CircuitStatus;
use crate::admin::AdminState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: usize,
    pub subscriptions: usize,
}

#[derive(Serialize)]
pub struct DeadLetterView {
    pub event_id: String,
    pub event_type: String,
    pub subscription: String,
    pub error: String,
    pub attempts: u32,
    pub age_secs: u64,
}

#[derive(Serialize)]
pub struct WebhookSummary {
    pub delivered: u64,
    pub failed: u64,
    pub dead_letters: usize,
    pub entries: Vec<DeadLetterView>,
}

#[derive(Deserialize)]
pub struct InvalidateRequest {
    /// Exact cache key to remove.
    pub key: Option<String>,
    /// Prefix selecting a class of keys (e.g., an endpoint name).
    pub prefix: Option<String>,
}

#[derive(Serialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        endpoints: state.gateway.circuit_statuses().len(),
        subscriptions: state.webhooks.subscription_count(),
    })
}

pub async fn get_circuits(State(state): State<AdminState>) -> Json<Vec<CircuitStatus>> {
    Json(state.gateway.circuit_statuses())
}

pub async fn get_queues(State(state): State<AdminState>) -> Json<Vec<QueueStats>> {
    Json(state.gateway.queue_stats())
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStats> {
    Json(state.gateway.cache_stats())
}

pub async fn get_dead_letters(State(state): State<AdminState>) -> Json<WebhookSummary> {
    let dlq = state.webhooks.dead_letters();
    let entries = dlq
        .peek(50)
        .into_iter()
        .map(|entry| DeadLetterView {
            event_id: entry.event.id.to_string(),
            event_type: entry.event.event_type.clone(),
            subscription: entry.subscription.to_string(),
            error: entry.error.clone(),
            attempts: entry.attempts,
            age_secs: entry.failed_at.elapsed().as_secs(),
        })
        .collect();

    Json(WebhookSummary {
        delivered: state.webhooks.delivered(),
        failed: state.webhooks.failed(),
        dead_letters: dlq.len(),
        entries,
    })
}

pub async fn invalidate_cache(
    State(state): State<AdminState>,
    Json(request): Json<InvalidateRequest>,
) -> Json<InvalidateResponse> {
    let removed = match (&request.key, &request.prefix) {
        (Some(key), _) => state.gateway.invalidate(key) as usize,
        (None, Some(prefix)) => state.gateway.invalidate_prefix(prefix),
        (None, None) => 0,
    };
    tracing::info!(removed, "Cache invalidation via admin surface");
    Json(InvalidateResponse { removed })
}
