//! Shared test helpers: a scripted in-memory [`Transport`].

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use vidgen_core::error::JobError;
use vidgen_core::retry::RetryPolicy;
use vidgen_core::transport::{Endpoint, Transport, TransportResponse};

/// One scripted answer for an endpoint.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(TransportResponse),
    /// A failure below HTTP, surfaced as [`JobError::Transient`].
    NetworkError(String),
    /// Never answers, like a request stuck in flight.
    Hang,
}

/// A request the stub received, with the (test-clock) time it arrived.
#[derive(Debug, Clone)]
pub struct Call {
    pub endpoint: Endpoint,
    pub body: Value,
    pub at: Instant,
}

/// Replays scripted replies per endpoint.
///
/// Replies are consumed in order; the last reply for an endpoint repeats
/// forever. Calling an endpoint with no script panics.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<Endpoint, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, endpoint: Endpoint, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .extend(replies);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn endpoints_called(&self) -> Vec<Endpoint> {
        self.calls().into_iter().map(|c| c.endpoint).collect()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }

    pub fn times(&self, endpoint: Endpoint) -> Vec<Instant> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .map(|c| c.at)
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, endpoint: Endpoint, body: &Value) -> Result<TransportResponse, JobError> {
        self.calls.lock().unwrap().push(Call {
            endpoint,
            body: body.clone(),
            at: Instant::now(),
        });

        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            let queue = scripts
                .get_mut(&endpoint)
                .unwrap_or_else(|| panic!("no script for endpoint {endpoint}"));
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue
                    .front()
                    .cloned()
                    .unwrap_or_else(|| panic!("empty script for endpoint {endpoint}"))
            }
        };

        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::NetworkError(message) => Err(JobError::Transient(message)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Reply builders
// ---------------------------------------------------------------------------

pub fn submitted(job_id: &str) -> Reply {
    Reply::Respond(TransportResponse::json(200, &json!({ "job_id": job_id })))
}

pub fn processing() -> Reply {
    Reply::Respond(TransportResponse::json(200, &json!({ "status": "PROCESSING" })))
}

pub fn video(bytes: &[u8]) -> Reply {
    Reply::Respond(TransportResponse::binary("video/mp4", bytes.to_vec()))
}

pub fn released() -> Reply {
    Reply::Respond(TransportResponse::json(200, &json!({ "ok": true })))
}

pub fn status(code: u16, body: Value) -> Reply {
    Reply::Respond(TransportResponse::json(code, &body))
}

pub fn rate_limited(retry_after_secs: u64) -> Reply {
    Reply::Respond(
        TransportResponse::json(429, &json!({ "error": "rate limit exceeded" }))
            .with_header("Retry-After", &retry_after_secs.to_string()),
    )
}

pub fn rate_limited_until_reset(reset_secs: u64) -> Reply {
    Reply::Respond(
        TransportResponse::json(429, &json!({ "error": "rate limit exceeded" }))
            .with_header("X-RateLimit-Reset", &reset_secs.to_string()),
    )
}

/// Retry policy without jitter so delays are exact under a paused clock.
pub fn exact_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
        multiplier: 2.0,
        jitter: 0.0,
    }
}
