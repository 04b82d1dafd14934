//! Upstream Integration Gateway
//!
//! A resilience layer mediating all outbound calls to third-party partner
//! APIs and all inbound webhook fan-out.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────────┐
//!                    │                INTEGRATION GATEWAY                  │
//!                    │                                                    │
//!   fetch(endpoint)  │  ┌───────┐   ┌─────────────┐   ┌───────────────┐  │
//!   ─────────────────┼─▶│ cache │──▶│single-flight│──▶│ request queue │  │
//!                    │  └───────┘   └─────────────┘   │ (token bucket)│  │
//!                    │                                └───────┬───────┘  │
//!                    │                                        ▼          │
//!                    │  ┌───────────┐   ┌─────────┐   ┌──────────────┐   │
//!   response         │  │ transport │◀──│  retry  │◀──│   circuit    │   │
//!   ◀────────────────┼──│ (HTTP)    │   │ backoff │   │   breaker    │   │
//!                    │  └───────────┘   └─────────┘   └──────────────┘   │
//!                    │                                                    │
//!   dispatch(event)  │  ┌──────────────┐   ┌─────────┐   ┌────────────┐  │
//!   ─────────────────┼─▶│ subscription │──▶│ per-sub │──▶│ dead-letter│  │
//!                    │  │   registry   │   │ workers │   │   queue    │  │
//!                    │  └──────────────┘   └─────────┘   └────────────┘  │
//!                    │                                                    │
//!                    │  ┌────────────────────────────────────────────┐    │
//!                    │  │  config · observability · admin · lifecycle│    │
//!                    │  └────────────────────────────────────────────┘    │
//!                    └────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use integration_gateway::admin::{run_admin_server, AdminState};
use integration_gateway::client::HttpTransport;
use integration_gateway::config::loader::load_config;
use integration_gateway::config::GatewayConfig;
use integration_gateway::{Gateway, Shutdown, WebhookDispatcher};

#[derive(Parser)]
#[command(name = "integration-gateway")]
#[command(about = "Resilience layer for third-party API integrations", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dump the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "integration_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    if args.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    tracing::info!(
        endpoints = config.endpoints.len(),
        metrics_enabled = config.observability.metrics_enabled,
        admin_enabled = config.admin.enabled,
        "integration-gateway v0.1.0 starting"
    );

    // Metrics exporter
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => integration_gateway::observability::metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let shutdown = Shutdown::new();

    // Outbound pipeline
    let transport = Arc::new(HttpTransport::new());
    let gateway = Arc::new(Gateway::new(&config, transport));
    gateway.spawn_workers(&shutdown);

    // Webhook fan-out
    let webhooks = Arc::new(WebhookDispatcher::new(config.webhooks.clone()));

    // Admin surface
    if config.admin.enabled {
        let state = AdminState {
            gateway: gateway.clone(),
            webhooks: webhooks.clone(),
        };
        let addr = config.admin.bind_address.parse()?;
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = run_admin_server(state, addr, rx).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();

    // Give workers a moment to drain their queues.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
