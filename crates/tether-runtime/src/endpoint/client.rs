use std::time::Duration;

use serde_json::Value;
use tether_core::endpoint::{RpcRequest, RpcResponse};
use tether_core::{Result, TetherError};

/// Client for endpoints served by [`HttpTransport`](super::HttpTransport).
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base_url: String,
}

impl RpcClient {
    /// Create a client for the node at `base_url`, e.g. `http://10.0.0.5:8776`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    /// Create a client with a request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TetherError::Endpoint(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_http(http, base_url))
    }

    /// Create a client around an existing HTTP client.
    pub fn with_http(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// Call `method` on any node serving `topic`.
    pub async fn call(&self, topic: &str, method: &str, args: Value) -> Result<Value> {
        self.post(format!("{}/rpc/{}", self.base_url, topic), method, args)
            .await
    }

    /// Call `method` on the node `server` of `topic`.
    pub async fn call_server(
        &self,
        topic: &str,
        server: &str,
        method: &str,
        args: Value,
    ) -> Result<Value> {
        self.post(
            format!("{}/rpc/{}/{}", self.base_url, topic, server),
            method,
            args,
        )
        .await
    }

    async fn post(&self, url: String, method: &str, args: Value) -> Result<Value> {
        let response = self
            .http
            .post(&url)
            .json(&RpcRequest::new(method, args))
            .send()
            .await
            .map_err(|e| TetherError::Endpoint(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body: RpcResponse = response.json().await.map_err(|e| {
            TetherError::Endpoint(format!("Invalid response from {} ({}): {}", url, status, e))
        })?;

        body.into_result()
    }
}
