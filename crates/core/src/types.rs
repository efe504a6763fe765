use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Reference to source media for image-to-video jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMedia {
    /// Publicly reachable `http(s)` URL.
    Url(String),
    /// Inline `data:` URI.
    Inline(String),
}

/// Parameters needed to price and submit a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub model: String,
    pub prompt: String,
    /// Duration selector, e.g. `"5s"`.
    pub duration: String,
    /// Resolution selector, e.g. `"720p"`. The service default applies
    /// when absent.
    pub resolution: Option<String>,
    pub source: Option<SourceMedia>,
}

impl JobRequest {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            duration: duration.into(),
            resolution: None,
            source: None,
        }
    }

    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn with_source(mut self, source: SourceMedia) -> Self {
        self.source = Some(source);
        self
    }

    /// JSON body shared by the quote and submit endpoints.
    pub fn to_wire(&self) -> Value {
        let mut body = json!({
            "model": self.model,
            "prompt": self.prompt,
            "duration": self.duration,
        });
        if let Some(fields) = body.as_object_mut() {
            if let Some(resolution) = &self.resolution {
                fields.insert("resolution".into(), json!(resolution));
            }
            match &self.source {
                Some(SourceMedia::Url(url)) => {
                    fields.insert("image_url".into(), json!(url));
                }
                Some(SourceMedia::Inline(data)) => {
                    fields.insert("image_data_url".into(), json!(data));
                }
                None => {}
            }
        }
        body
    }
}

/// Advisory price estimate for a prospective job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobQuote {
    pub price: f64,
    pub currency: Option<String>,
    /// Full quote payload as returned by the service.
    pub raw: Value,
}

/// Opaque identifier of a submitted job, plus the model it runs on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    id: String,
    model: String,
}

impl JobHandle {
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// JSON body shared by the status and complete endpoints.
    pub fn to_wire(&self) -> Value {
        json!({
            "job_id": self.id,
            "model": self.model,
        })
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Remote job status as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Complete,
}

/// The finished artifact.
#[derive(Clone, PartialEq, Eq)]
pub struct JobResult {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

impl JobResult {
    /// File extension conventionally used for [`Self::media_type`].
    pub fn file_extension(&self) -> &'static str {
        let essence = self
            .media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "video/mp4" | "application/mp4" => "mp4",
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            "image/gif" => "gif",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

impl fmt::Debug for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobResult")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("media_type", &self.media_type)
            .finish()
    }
}

/// One decoded poll response.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatusView {
    /// Structured status payload: the job is still running.
    Processing {
        status: Option<String>,
        progress: Option<f64>,
    },
    /// Binary payload: the artifact is ready.
    Complete(JobResult),
}

impl JobStatusView {
    pub fn status(&self) -> JobStatus {
        match self {
            JobStatusView::Processing { .. } => JobStatus::Processing,
            JobStatusView::Complete(_) => JobStatus::Complete,
        }
    }
}

/// Acknowledgement of the completion (storage release) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ack {
    /// The service released the job's storage.
    Released,
    /// The service no longer knew the job; nothing left to release.
    AlreadyReleased,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_body_omits_unset_fields() {
        let body = JobRequest::new("demo", "lake at sunrise", "5s").to_wire();
        assert_eq!(
            body,
            json!({"model": "demo", "prompt": "lake at sunrise", "duration": "5s"})
        );
    }

    #[test]
    fn request_wire_body_includes_source() {
        let body = JobRequest::new("demo", "pan left", "10s")
            .with_resolution("720p")
            .with_source(SourceMedia::Url("https://cdn.test/a.png".into()))
            .to_wire();
        assert_eq!(body["resolution"], "720p");
        assert_eq!(body["image_url"], "https://cdn.test/a.png");
        assert!(body.get("image_data_url").is_none());

        let body = JobRequest::new("demo", "pan left", "10s")
            .with_source(SourceMedia::Inline("data:image/png;base64,AAAA".into()))
            .to_wire();
        assert_eq!(body["image_data_url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn handle_wire_body() {
        let handle = JobHandle::new("q-1", "demo");
        assert_eq!(handle.to_wire(), json!({"job_id": "q-1", "model": "demo"}));
        assert_eq!(handle.to_string(), "q-1");
    }

    #[test]
    fn file_extension_ignores_parameters() {
        let result = JobResult {
            bytes: vec![1, 2, 3],
            media_type: "Video/MP4; codecs=avc1".into(),
        };
        assert_eq!(result.file_extension(), "mp4");
        assert_eq!(format!("{result:?}"), r#"JobResult { bytes: <3 bytes>, media_type: "Video/MP4; codecs=avc1" }"#);
    }
}
