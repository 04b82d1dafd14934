//! Request and response value types for upstream calls.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HTTP method subset used against partner APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical request to an upstream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRequest {
    /// Correlation ID carried through logs and the queue.
    pub id: Uuid,

    pub method: HttpMethod,

    /// Path resolved against the endpoint's base URL.
    pub path: String,

    /// Optional JSON body.
    pub body: Option<serde_json::Value>,

    /// Whether this request may be merged into a batch upstream call.
    pub batchable: bool,
}

impl UpstreamRequest {
    /// A GET request for the given path.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: HttpMethod::Get,
            path: path.into(),
            body: None,
            batchable: false,
        }
    }

    /// A POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: HttpMethod::Post,
            path: path.into(),
            body: Some(body),
            batchable: false,
        }
    }

    /// Mark the request as eligible for batch coalescing.
    pub fn batchable(mut self) -> Self {
        self.batchable = true;
        self
    }

    /// Cache key for this request under the given endpoint.
    ///
    /// Method, path and body all participate so distinct payloads never
    /// alias each other.
    pub fn cache_key(&self, endpoint: &str) -> String {
        match &self.body {
            Some(body) => format!("{}:{}:{}:{}", endpoint, self.method, self.path, body),
            None => format!("{}:{}:{}", endpoint, self.method, self.path),
        }
    }
}

/// Successful response from an upstream endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamResponse {
    /// HTTP status (always 2xx/3xx; error statuses become typed errors).
    pub status: u16,

    /// Response body parsed as JSON, or Null for empty bodies.
    pub body: serde_json::Value,
}
