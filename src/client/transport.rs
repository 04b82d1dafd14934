//! Outbound HTTP transport.
//!
//! # Responsibilities
//! - Resolve requests against the endpoint base URL
//! - Enforce the per-request deadline at the socket level
//! - Classify failures: connect/timeout → transient, 4xx → client, 5xx → server

use async_trait::async_trait;
use url::Url;

use crate::client::types::{HttpMethod, UpstreamRequest, UpstreamResponse};
use crate::config::EndpointConfig;
use crate::error::{GatewayError, GatewayResult};

/// Abstraction over the outbound HTTP client.
///
/// The pipeline only ever talks to this trait, so the backing client is
/// swappable and tests can inject scripted implementations.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        endpoint: &EndpointConfig,
        request: &UpstreamRequest,
    ) -> GatewayResult<UpstreamResponse>;
}

/// Default transport on top of reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn resolve_url(endpoint: &EndpointConfig, path: &str) -> GatewayResult<Url> {
        let base: Url = endpoint.base_url.parse().map_err(|e| GatewayError::Network {
            endpoint: endpoint.name.clone(),
            reason: format!("invalid base URL: {e}"),
        })?;
        base.join(path.trim_start_matches('/'))
            .map_err(|e| GatewayError::Network {
                endpoint: endpoint.name.clone(),
                reason: format!("invalid request path {path:?}: {e}"),
            })
    }

    fn map_send_error(endpoint: &EndpointConfig, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout {
                endpoint: endpoint.name.clone(),
                timeout_ms: endpoint.timeout_ms,
            }
        } else {
            GatewayError::Network {
                endpoint: endpoint.name.clone(),
                reason: err.to_string(),
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: &EndpointConfig,
        request: &UpstreamRequest,
    ) -> GatewayResult<UpstreamResponse> {
        let url = Self::resolve_url(endpoint, &request.path)?;

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Delete => self.client.delete(url),
        };
        builder = builder
            .timeout(std::time::Duration::from_millis(endpoint.timeout_ms))
            .header("x-request-id", request.id.to_string());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_send_error(endpoint, e))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(GatewayError::Server {
                endpoint: endpoint.name.clone(),
                status: status.as_u16(),
            });
        }
        if status.is_client_error() {
            return Err(GatewayError::Client {
                endpoint: endpoint.name.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or(serde_json::Value::Null);

        Ok(UpstreamResponse {
            status: status.as_u16(),
            body,
        })
    }
}
