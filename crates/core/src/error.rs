use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::rate_limit;
use crate::transport::TransportResponse;
use crate::types::JobHandle;

/// Remediation shown alongside [`JobError::PaymentRequired`].
pub const PAYMENT_REMEDIATION: &str = "top up the account balance, then resubmit";

/// Error bodies longer than this are truncated before being surfaced.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Matches error messages that describe a content-policy rejection.
static POLICY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)content[ _-]?policy|moderation|safety (system|filter)|policy[ _-]violation")
        .expect("valid regex")
});

/// Every failure the job workflow can surface.
///
/// Only [`JobError::RateLimited`] and [`JobError::Transient`] are retried;
/// see [`JobError::is_retryable`].
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Bad request shape or parameters, detected locally or reported by
    /// the service.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Missing, invalid or insufficiently privileged credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The account cannot pay for the job.
    #[error("Payment required: {message} ({hint})")]
    PaymentRequired {
        message: String,
        hint: &'static str,
    },

    /// The prompt or source media was rejected by the content policy.
    #[error("Content policy violation: {0}")]
    PolicyViolation(String),

    /// HTTP 429. `retry_after` carries the service's reset hint, if any.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Network failure, 408 or 5xx.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The local wall-clock budget ran out. The remote job is left running
    /// and can still be resumed with `handle`.
    #[error("Timed out after {elapsed:?} waiting for job {handle}")]
    Timeout {
        handle: JobHandle,
        elapsed: Duration,
    },

    /// The caller cancelled the run.
    #[error("Cancelled{}", .handle.as_ref().map(|h| format!(" while waiting for job {h}")).unwrap_or_default())]
    Cancelled { handle: Option<JobHandle> },

    /// The status payload reported that the job failed on the remote side.
    #[error("Job {handle} failed remotely with status {status}")]
    RemoteFailure { handle: JobHandle, status: String },

    /// The service answered with something that cannot be interpreted.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl JobError {
    /// Whether retrying the same request can change the outcome.
    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::RateLimited { .. } | JobError::Transient(_))
    }

    /// Short machine-readable name of the variant, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Validation(_) => "validation",
            JobError::Auth(_) => "auth",
            JobError::PaymentRequired { .. } => "payment_required",
            JobError::PolicyViolation(_) => "policy_violation",
            JobError::RateLimited { .. } => "rate_limited",
            JobError::Transient(_) => "transient",
            JobError::Timeout { .. } => "timeout",
            JobError::Cancelled { .. } => "cancelled",
            JobError::RemoteFailure { .. } => "remote_failure",
            JobError::Protocol(_) => "protocol",
        }
    }

    /// Fill in the job handle on a [`JobError::Cancelled`] that was raised
    /// before the handle was known to the cancelling code.
    pub fn with_handle(self, handle: &JobHandle) -> Self {
        match self {
            JobError::Cancelled { handle: None } => JobError::Cancelled {
                handle: Some(handle.clone()),
            },
            other => other,
        }
    }
}

/// Map a non-2xx response onto the error taxonomy.
///
/// - 451, or 400/403/422 whose message mentions content policy -> `PolicyViolation`
/// - 401, 403 -> `Auth`
/// - 402 -> `PaymentRequired`
/// - 408, 5xx -> `Transient`
/// - 429 -> `RateLimited`, with the reset hint parsed from the headers
/// - any other status -> `Validation`
pub fn classify_response(response: &TransportResponse, now: DateTime<Utc>) -> JobError {
    let status = response.status;
    let message = error_message(&response.body);

    match status {
        451 => JobError::PolicyViolation(message),
        400 | 403 | 422 if POLICY_RE.is_match(&message) => JobError::PolicyViolation(message),
        401 | 403 => JobError::Auth(message),
        402 => JobError::PaymentRequired {
            message,
            hint: PAYMENT_REMEDIATION,
        },
        408 => JobError::Transient(format!("HTTP 408: {message}")),
        429 => JobError::RateLimited {
            message,
            retry_after: rate_limit::reset_hint(&response.headers, now),
        },
        500..=599 => JobError::Transient(format!("HTTP {status}: {message}")),
        _ => JobError::Validation(format!("HTTP {status}: {message}")),
    }
}

/// Extract a human-readable message from an error body.
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}`,
/// `{"message": "..."}` and `{"detail": "..."}`. Anything else is returned
/// as (truncated) text.
pub fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        let candidates = [
            value.get("error").and_then(|e| e.get("message")),
            value.get("error"),
            value.get("message"),
            value.get("detail"),
        ];
        if let Some(text) = candidates.into_iter().flatten().find_map(|v| v.as_str()) {
            return truncate(text);
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "<empty body>".to_string();
    }
    truncate(text)
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
