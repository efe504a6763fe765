//! Request validation and the optional catalog of served models.
//!
//! [`validate_request`] checks request shape only. A [`ModelCatalog`], when
//! configured, additionally restricts models, durations and resolutions to
//! the values the service is known to serve, so bad requests fail before
//! any remote call.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::JobError;
use crate::types::{JobRequest, SourceMedia};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 4_000;

/// Maximum model identifier length in characters.
pub const MAX_MODEL_LENGTH: usize = 200;

/// Duration selectors look like `5s`.
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]{0,3}s$").expect("valid regex"));

/// Resolution selectors look like `720p`.
static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9][0-9]{1,4}p$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Shape validation
// ---------------------------------------------------------------------------

/// Validate a model identifier: non-blank and within length limit.
pub fn validate_model(model: &str) -> Result<(), JobError> {
    if model.trim().is_empty() {
        return Err(JobError::Validation("Model must not be empty".to_string()));
    }
    if model.chars().count() > MAX_MODEL_LENGTH {
        return Err(JobError::Validation(format!(
            "Model exceeds maximum length of {MAX_MODEL_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate a prompt: non-blank and within length limit.
pub fn validate_prompt(prompt: &str) -> Result<(), JobError> {
    if prompt.trim().is_empty() {
        return Err(JobError::Validation("Prompt must not be empty".to_string()));
    }
    let len = prompt.chars().count();
    if len > MAX_PROMPT_LENGTH {
        return Err(JobError::Validation(format!(
            "Prompt exceeds maximum length of {MAX_PROMPT_LENGTH} characters (got {len})"
        )));
    }
    Ok(())
}

pub fn validate_duration(duration: &str) -> Result<(), JobError> {
    if DURATION_RE.is_match(duration) {
        Ok(())
    } else {
        Err(JobError::Validation(format!(
            "Invalid duration '{duration}'. Expected seconds such as '5s'"
        )))
    }
}

pub fn validate_resolution(resolution: &str) -> Result<(), JobError> {
    if RESOLUTION_RE.is_match(resolution) {
        Ok(())
    } else {
        Err(JobError::Validation(format!(
            "Invalid resolution '{resolution}'. Expected a height such as '720p'"
        )))
    }
}

/// Source media must be an `http(s)` URL or a `data:` URI.
pub fn validate_source(source: &SourceMedia) -> Result<(), JobError> {
    match source {
        SourceMedia::Url(url) if url.starts_with("https://") || url.starts_with("http://") => {
            Ok(())
        }
        SourceMedia::Url(url) => Err(JobError::Validation(format!(
            "Source URL must use http or https (got '{url}')"
        ))),
        SourceMedia::Inline(data) if data.starts_with("data:") && data.contains(',') => Ok(()),
        SourceMedia::Inline(_) => Err(JobError::Validation(
            "Inline source media must be a data: URI".to_string(),
        )),
    }
}

/// Validate the shape of every field of a request.
pub fn validate_request(request: &JobRequest) -> Result<(), JobError> {
    validate_model(&request.model)?;
    validate_prompt(&request.prompt)?;
    validate_duration(&request.duration)?;
    if let Some(resolution) = &request.resolution {
        validate_resolution(resolution)?;
    }
    if let Some(source) = &request.source {
        validate_source(source)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// What one model accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLimits {
    /// Allowed duration selectors. Empty means any well-formed duration.
    #[serde(default)]
    pub durations: Vec<String>,
    /// Allowed resolution selectors. Empty means any well-formed resolution.
    #[serde(default)]
    pub resolutions: Vec<String>,
    /// Whether the model accepts source media (image-to-video).
    #[serde(default = "default_true")]
    pub accepts_source: bool,
}

fn default_true() -> bool {
    true
}

/// Models the service is known to serve, keyed by model identifier.
///
/// Deserializes from a JSON object such as
/// `{"demo": {"durations": ["5s", "10s"], "resolutions": ["720p"]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelLimits>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>, limits: ModelLimits) -> Self {
        self.models.insert(model.into(), limits);
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn limits(&self, model: &str) -> Option<&ModelLimits> {
        self.models.get(model)
    }

    /// Check that the request's model and selectors are served.
    pub fn check(&self, request: &JobRequest) -> Result<(), JobError> {
        let limits = self.models.get(&request.model).ok_or_else(|| {
            JobError::Validation(format!(
                "Unknown model '{}'. Known models: {}",
                request.model,
                self.model_names().collect::<Vec<_>>().join(", ")
            ))
        })?;

        check_allowed("duration", &request.duration, &limits.durations)?;
        if let Some(resolution) = &request.resolution {
            check_allowed("resolution", resolution, &limits.resolutions)?;
        }
        if request.source.is_some() && !limits.accepts_source {
            return Err(JobError::Validation(format!(
                "Model '{}' does not accept source media",
                request.model
            )));
        }
        Ok(())
    }
}

fn check_allowed(field: &str, value: &str, allowed: &[String]) -> Result<(), JobError> {
    if allowed.is_empty() || allowed.iter().any(|a| a == value) {
        Ok(())
    } else {
        Err(JobError::Validation(format!(
            "Unsupported {field} '{value}'. Must be one of: {}",
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn catalog() -> ModelCatalog {
        ModelCatalog::new().with_model(
            "demo",
            ModelLimits {
                durations: vec!["5s".into(), "10s".into()],
                resolutions: vec!["720p".into()],
                accepts_source: false,
            },
        )
    }

    #[test]
    fn well_formed_request_passes() {
        let request = JobRequest::new("demo", "lake at sunrise", "5s").with_resolution("1080p");
        assert!(validate_request(&request).is_ok());
    }

    #[test]
    fn blank_or_oversized_prompt_rejected() {
        assert_matches!(validate_prompt("   "), Err(JobError::Validation(_)));
        let long = "a".repeat(MAX_PROMPT_LENGTH + 1);
        assert_matches!(validate_prompt(&long), Err(JobError::Validation(msg)) if msg.contains("4001"));
        assert!(validate_prompt(&"a".repeat(MAX_PROMPT_LENGTH)).is_ok());
    }

    #[test]
    fn selector_formats() {
        assert!(validate_duration("5s").is_ok());
        assert!(validate_duration("0s").is_err());
        assert!(validate_duration("5").is_err());
        assert!(validate_resolution("720p").is_ok());
        assert!(validate_resolution("hd").is_err());
    }

    #[test]
    fn source_media_forms() {
        assert!(validate_source(&SourceMedia::Url("https://cdn.test/a.png".into())).is_ok());
        assert!(validate_source(&SourceMedia::Url("ftp://cdn.test/a.png".into())).is_err());
        assert!(validate_source(&SourceMedia::Inline("data:image/png;base64,AAAA".into())).is_ok());
        assert!(validate_source(&SourceMedia::Inline("AAAA".into())).is_err());
    }

    #[test]
    fn catalog_restricts_values() {
        let catalog = catalog();
        assert!(catalog.check(&JobRequest::new("demo", "p", "10s")).is_ok());

        let err = catalog.check(&JobRequest::new("other", "p", "5s")).unwrap_err();
        assert_matches!(err, JobError::Validation(msg) if msg.contains("Known models: demo"));

        let err = catalog.check(&JobRequest::new("demo", "p", "7s")).unwrap_err();
        assert_matches!(err, JobError::Validation(msg) if msg.contains("5s, 10s"));

        let request = JobRequest::new("demo", "p", "5s").with_resolution("1080p");
        assert!(catalog.check(&request).is_err());

        let request = JobRequest::new("demo", "p", "5s")
            .with_source(SourceMedia::Url("https://cdn.test/a.png".into()));
        assert!(catalog.check(&request).is_err());
    }

    #[test]
    fn catalog_from_json() {
        let catalog = ModelCatalog::from_json_str(
            r#"{"demo": {"durations": ["5s"]}, "fast": {}}"#,
        )
        .unwrap();
        assert_eq!(catalog.model_names().collect::<Vec<_>>(), vec!["demo", "fast"]);
        assert!(catalog.limits("fast").unwrap().accepts_source);
        assert!(catalog.check(&JobRequest::new("fast", "p", "30s")).is_ok());
    }
}
