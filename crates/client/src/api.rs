//! HTTP transport for the video-generation endpoints.
//!
//! Wraps the service's REST API (quote, submit, status, complete) using
//! [`reqwest`]. Every call is a JSON-bodied `POST` with bearer
//! authentication; responses are returned raw so the orchestrator can
//! classify and decode them.

use std::time::Duration;

use async_trait::async_trait;
use vidgen_core::error::JobError;
use vidgen_core::transport::{Endpoint, Transport, TransportResponse};

/// Default request timeout for a single HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Request paths of the job endpoints, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub quote: String,
    pub submit: String,
    pub status: String,
    pub complete: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            quote: "/api/video/quote".into(),
            submit: "/api/video/generate".into(),
            status: "/api/video/status".into(),
            complete: "/api/video/complete".into(),
        }
    }
}

impl Endpoints {
    pub fn path(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Quote => &self.quote,
            Endpoint::Submit => &self.submit,
            Endpoint::Status => &self.status,
            Endpoint::Complete => &self.complete,
        }
    }
}

/// HTTP client for one account on one service instance.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    endpoints: Endpoints,
}

impl HttpTransport {
    /// Create a new transport with its own connection pool.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `https://api.example.com`.
    /// * `api_key`  - Sent as `Authorization: Bearer <api_key>`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Create a transport reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across several accounts).
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key: api_key.into(),
            endpoints: Endpoints::default(),
        }
    }

    /// Override the endpoint paths.
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, self.endpoints.path(endpoint))
    }

    /// Read status, headers and body off a response without interpreting
    /// the body.
    async fn into_transport_response(
        response: reqwest::Response,
    ) -> Result<TransportResponse, JobError> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(request_error)?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, JobError> {
        let url = self.url(endpoint);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let response = Self::into_transport_response(response).await?;

        tracing::debug!(
            endpoint = %endpoint,
            status = response.status,
            content_type = response.content_type().unwrap_or("-"),
            bytes = response.body.len(),
            "HTTP response received",
        );

        Ok(response)
    }
}

/// Failures below HTTP are transient: the same request may succeed later.
fn request_error(err: reqwest::Error) -> JobError {
    if err.is_builder() {
        return JobError::Protocol(format!("invalid request: {err}"));
    }
    JobError::Transient(format!("HTTP request failed: {err}"))
}
