use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use vidgen_core::catalog::ModelCatalog;
use vidgen_core::retry::RetryPolicy;

use crate::api::HttpTransport;
use crate::orchestrator::{JobOrchestrator, RunOptions};

/// Default service base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.example.com";

/// Errors raised while loading client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    /// An environment variable holds a value of the wrong shape.
    #[error("{name} must be {expected} (got '{value}')")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Failed to read model catalog {}: {source}", .path.display())]
    CatalogRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse model catalog {}: {source}", .path.display())]
    CatalogParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client configuration loaded from environment variables.
///
/// Credentials travel in this value rather than in process-wide state, so
/// several accounts can be driven from one process.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    /// Timeout of a single HTTP call.
    pub request_timeout: Duration,
    /// Poll interval and overall budget for `run` / `resume`.
    pub run: RunOptions,
    pub retry: RetryPolicy,
    /// JSON file describing the models the service serves.
    pub catalog_path: Option<PathBuf>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("run", &self.run)
            .field("retry", &self.retry)
            .field("catalog_path", &self.catalog_path)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                   |
    /// |--------------------------------|---------------------------|
    /// | `VIDGEN_API_KEY`               | required                  |
    /// | `VIDGEN_BASE_URL`              | `https://api.example.com` |
    /// | `VIDGEN_REQUEST_TIMEOUT_SECS`  | `60`                      |
    /// | `VIDGEN_POLL_INTERVAL_SECS`    | `10`                      |
    /// | `VIDGEN_RUN_TIMEOUT_SECS`      | `900`                     |
    /// | `VIDGEN_MAX_ATTEMPTS`          | `4`                       |
    /// | `VIDGEN_RETRY_INITIAL_MS`      | `500`                     |
    /// | `VIDGEN_RETRY_MAX_MS`          | `30000`                   |
    /// | `VIDGEN_CATALOG_PATH`          | unset                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("VIDGEN_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("VIDGEN_API_KEY"))?;

        let base_url = lookup("VIDGEN_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "VIDGEN_BASE_URL",
                expected: "an http(s) URL",
                value: base_url,
            });
        }

        let request_timeout =
            Duration::from_secs(parse_u64(&lookup, "VIDGEN_REQUEST_TIMEOUT_SECS", 60)?);
        let poll_interval =
            Duration::from_secs(parse_u64(&lookup, "VIDGEN_POLL_INTERVAL_SECS", 10)?);
        let timeout = Duration::from_secs(parse_u64(&lookup, "VIDGEN_RUN_TIMEOUT_SECS", 900)?);

        let defaults = RetryPolicy::default();
        let max_attempts = parse_u64(&lookup, "VIDGEN_MAX_ATTEMPTS", defaults.max_attempts as u64)?;
        let max_attempts = u32::try_from(max_attempts)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(ConfigError::Invalid {
                name: "VIDGEN_MAX_ATTEMPTS",
                expected: "a positive integer",
                value: max_attempts.to_string(),
            })?;
        let initial_delay = Duration::from_millis(parse_u64(
            &lookup,
            "VIDGEN_RETRY_INITIAL_MS",
            defaults.initial_delay.as_millis() as u64,
        )?);
        let max_delay = Duration::from_millis(parse_u64(
            &lookup,
            "VIDGEN_RETRY_MAX_MS",
            defaults.max_delay.as_millis() as u64,
        )?);

        let catalog_path = lookup("VIDGEN_CATALOG_PATH")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api_key,
            base_url,
            request_timeout,
            run: RunOptions {
                poll_interval,
                timeout,
            },
            retry: RetryPolicy {
                max_attempts,
                initial_delay,
                max_delay,
                ..defaults
            },
            catalog_path,
        })
    }

    /// Read the model catalog, if one is configured.
    pub fn load_catalog(&self) -> Result<Option<ModelCatalog>, ConfigError> {
        let Some(path) = &self.catalog_path else {
            return Ok(None);
        };
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::CatalogRead {
            path: path.clone(),
            source,
        })?;
        let catalog =
            ModelCatalog::from_json_str(&json).map_err(|source| ConfigError::CatalogParse {
                path: path.clone(),
                source,
            })?;
        Ok(Some(catalog))
    }

    pub fn build_transport(&self) -> Result<HttpTransport, ConfigError> {
        Ok(HttpTransport::new(
            &self.base_url,
            &self.api_key,
            self.request_timeout,
        )?)
    }

    /// Build an orchestrator wired with this configuration's transport,
    /// retry policy and catalog.
    pub fn build_orchestrator(&self) -> Result<JobOrchestrator<HttpTransport>, ConfigError> {
        let mut orchestrator =
            JobOrchestrator::new(self.build_transport()?).with_retry_policy(self.retry.clone());
        if let Some(catalog) = self.load_catalog()? {
            orchestrator = orchestrator.with_catalog(catalog);
        }
        Ok(orchestrator)
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "a non-negative integer",
            value,
        }),
    }
}
