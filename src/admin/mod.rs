//! Admin/diagnostic surface.
//!
//! Read-mostly endpoints for operators: circuit snapshots, queue depths,
//! dead-letter inspection and cache invalidation. Served on its own bind
//! address, separate from the metrics exporter.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use self::handlers::*;
use crate::gateway::Gateway;
use crate::webhook::WebhookDispatcher;

/// State injected into the admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub gateway: Arc<Gateway>,
    pub webhooks: Arc<WebhookDispatcher>,
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/circuits", get(get_circuits))
        .route("/admin/queues", get(get_queues))
        .route("/admin/cache", get(get_cache))
        .route("/admin/dead-letters", get(get_dead_letters))
        .route("/admin/cache/invalidate", post(invalidate_cache))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin surface until shutdown is triggered.
pub async fn run_admin_server(
    state: AdminState,
    addr: SocketAddr,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "Admin surface listening");

    axum::serve(listener, admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
