//! Decoding of successful responses into domain values.
//!
//! Poll responses are discriminated by their declared content type: a JSON
//! media type is a status payload, anything else is the finished artifact.
//! The body is never parsed speculatively to find out which one it is.

use serde::Deserialize;

use crate::error::JobError;
use crate::transport::TransportResponse;
use crate::types::{JobHandle, JobQuote, JobResult, JobStatusView};

/// Status strings (compared case-insensitively) that mean the remote job
/// has failed and will never produce an artifact.
pub const REMOTE_FAILURE_STATUSES: &[&str] = &[
    "FAILED",
    "FAILURE",
    "ERROR",
    "CANCELLED",
    "CANCELED",
    "EXPIRED",
];

#[derive(Debug, Deserialize)]
struct QuotePayload {
    #[serde(alias = "cost")]
    price: f64,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitPayload {
    #[serde(alias = "run_id", alias = "runId", alias = "jobId", alias = "request_id", alias = "id")]
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
}

/// Whether a `Content-Type` value denotes JSON (`application/json` or any
/// `+json` structured suffix), ignoring parameters such as `charset`.
pub fn is_json_media_type(content_type: &str) -> bool {
    let essence = media_type_essence(content_type);
    essence == "application/json" || essence.ends_with("+json")
}

/// Lower-cased `type/subtype` without parameters.
pub fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Decode a successful poll response into a [`JobStatusView`].
///
/// - JSON content type: status payload. A failure status becomes
///   [`JobError::RemoteFailure`]; any other status means still processing.
/// - `text/*` content type: [`JobError::Protocol`] (error pages from proxies
///   are not artifacts).
/// - Any other content type: the artifact, which must be non-empty.
/// - No content type: [`JobError::Protocol`].
pub fn decode_poll(
    handle: &JobHandle,
    response: &TransportResponse,
) -> Result<JobStatusView, JobError> {
    let content_type = response.content_type().ok_or_else(|| {
        JobError::Protocol(format!(
            "status response for job {handle} declared no content type"
        ))
    })?;

    if is_json_media_type(content_type) {
        let payload: StatusPayload = serde_json::from_slice(&response.body).map_err(|e| {
            JobError::Protocol(format!("malformed status payload for job {handle}: {e}"))
        })?;

        if let Some(status) = &payload.status {
            if REMOTE_FAILURE_STATUSES
                .iter()
                .any(|failed| failed.eq_ignore_ascii_case(status))
            {
                return Err(JobError::RemoteFailure {
                    handle: handle.clone(),
                    status: status.clone(),
                });
            }
        }

        return Ok(JobStatusView::Processing {
            status: payload.status,
            progress: payload.progress,
        });
    }

    let essence = media_type_essence(content_type);
    if essence.starts_with("text/") {
        return Err(JobError::Protocol(format!(
            "unexpected {essence} status response for job {handle}"
        )));
    }
    if response.body.is_empty() {
        return Err(JobError::Protocol(format!(
            "empty {essence} artifact for job {handle}"
        )));
    }

    Ok(JobStatusView::Complete(JobResult {
        bytes: response.body.clone(),
        media_type: content_type.to_string(),
    }))
}

/// Decode a successful quote response.
pub fn decode_quote(response: &TransportResponse) -> Result<JobQuote, JobError> {
    let raw: serde_json::Value = serde_json::from_slice(&response.body)
        .map_err(|e| JobError::Protocol(format!("malformed quote payload: {e}")))?;
    let payload = QuotePayload::deserialize(&raw)
        .map_err(|e| JobError::Protocol(format!("quote payload has no price: {e}")))?;

    Ok(JobQuote {
        price: payload.price,
        currency: payload.currency,
        raw,
    })
}

/// Decode a successful submit response into the handle for `model`.
pub fn decode_submit(model: &str, response: &TransportResponse) -> Result<JobHandle, JobError> {
    let payload: SubmitPayload = serde_json::from_slice(&response.body)
        .map_err(|e| JobError::Protocol(format!("submit payload has no job id: {e}")))?;

    if payload.job_id.trim().is_empty() {
        return Err(JobError::Protocol("submit payload has an empty job id".into()));
    }

    Ok(JobHandle::new(payload.job_id, model))
}
