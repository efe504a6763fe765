//! Boundary between the orchestrator and the HTTP layer.
//!
//! A [`Transport`] sends one JSON body to one of the four job endpoints and
//! hands back the raw [`TransportResponse`]. It never interprets the body;
//! classification and decoding happen in [`crate::error`] and
//! [`crate::decode`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::JobError;

/// Header carrying the declared media type of a response body.
pub const CONTENT_TYPE: &str = "content-type";

/// The remote endpoints involved in a job's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    Quote,
    Submit,
    Status,
    Complete,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Quote => "quote",
            Endpoint::Submit => "submit",
            Endpoint::Status => "status",
            Endpoint::Complete => "complete",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status, headers and body of one HTTP response.
///
/// Header names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// A response with a JSON body and `application/json` content type.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, "application/json")
            .with_body(value.to_string().into_bytes())
    }

    /// A 200 response carrying a binary artifact of the given media type.
    pub fn binary(media_type: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(200)
            .with_header(CONTENT_TYPE, media_type)
            .with_body(bytes)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The declared media type, if the response carried one.
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs authenticated requests against the job endpoints.
///
/// Implementations return `Err` only for failures below HTTP (connection
/// refused, TLS, timeouts), mapped to [`JobError::Transient`]. Any HTTP
/// status, including 4xx/5xx, is an `Ok` response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, JobError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, JobError> {
        (**self).send(endpoint, body).await
    }
}
