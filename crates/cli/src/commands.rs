//! Subcommand definitions and their execution.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use vidgen_client::{CancellationToken, JobOrchestrator, RunOptions};
use vidgen_core::error::JobError;
use vidgen_core::transport::Transport;
use vidgen_core::types::{JobHandle, JobRequest, JobResult, JobStatusView, SourceMedia};

/// Generate videos through an asynchronous job API.
///
/// Examples:
///   vidgen quote --model demo --prompt "lake at sunrise"
///   vidgen run --model demo --prompt "lake at sunrise" -o lake.mp4
///   vidgen resume q-1 --model demo
#[derive(Debug, Parser)]
#[command(name = "vidgen")]
#[command(version)]
#[command(about = "Generate videos through an asynchronous job API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ask what a job would cost.
    Quote(JobArgs),

    /// Submit a job, wait for the video and save it.
    Run {
        #[command(flatten)]
        job: JobArgs,
        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Wait for an already submitted job and save it.
    Resume {
        #[command(flatten)]
        handle: HandleArgs,
        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Check a job's status once.
    Poll {
        #[command(flatten)]
        handle: HandleArgs,
        /// Where to save the video if the job has finished.
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Release a job's remote storage.
    Complete(HandleArgs),
}

#[derive(Debug, Args)]
pub struct JobArgs {
    /// Model identifier.
    #[arg(long)]
    pub model: String,

    /// Text prompt describing the video.
    #[arg(long)]
    pub prompt: String,

    /// Duration selector, e.g. 5s.
    #[arg(long, default_value = "5s")]
    pub duration: String,

    /// Resolution selector, e.g. 720p.
    #[arg(long)]
    pub resolution: Option<String>,

    /// Source image as an http(s) URL or a data: URI.
    #[arg(long, value_name = "URL")]
    pub image: Option<String>,
}

impl JobArgs {
    pub fn request(&self) -> JobRequest {
        let mut request = JobRequest::new(&self.model, &self.prompt, &self.duration);
        if let Some(resolution) = &self.resolution {
            request = request.with_resolution(resolution);
        }
        if let Some(image) = &self.image {
            let source = if image.starts_with("data:") {
                SourceMedia::Inline(image.clone())
            } else {
                SourceMedia::Url(image.clone())
            };
            request = request.with_source(source);
        }
        request
    }
}

#[derive(Debug, Args)]
pub struct HandleArgs {
    /// Job identifier returned at submission.
    pub job_id: String,

    /// Model the job was submitted with.
    #[arg(long)]
    pub model: String,
}

impl HandleArgs {
    pub fn handle(&self) -> JobHandle {
        JobHandle::new(&self.job_id, &self.model)
    }
}

#[derive(Debug, Args)]
pub struct WaitArgs {
    /// Where to save the video. Defaults to vidgen-<timestamp>.<ext>.
    #[arg(long, short, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Seconds between status polls (overrides VIDGEN_POLL_INTERVAL_SECS).
    #[arg(long, value_name = "SECS")]
    pub poll_interval_secs: Option<u64>,

    /// Seconds to wait before giving up locally (overrides VIDGEN_RUN_TIMEOUT_SECS).
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl WaitArgs {
    pub fn options(&self, defaults: &RunOptions) -> RunOptions {
        RunOptions {
            poll_interval: self
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Run one subcommand to completion.
pub async fn execute<T: Transport>(
    command: Command,
    orchestrator: &JobOrchestrator<T>,
    defaults: &RunOptions,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Command::Quote(job) => {
            let quote = interruptible(cancel, orchestrator.quote(&job.request())).await?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
        Command::Run { job, wait } => {
            let result = orchestrator
                .run_to_completion(&job.request(), &wait.options(defaults), cancel)
                .await
                .map_err(explain)?;
            let path = save(&result, wait.output).await?;
            println!("{}", path.display());
        }
        Command::Resume { handle, wait } => {
            let result = orchestrator
                .resume(&handle.handle(), &wait.options(defaults), cancel)
                .await
                .map_err(explain)?;
            let path = save(&result, wait.output).await?;
            println!("{}", path.display());
        }
        Command::Poll { handle, output } => {
            let job = handle.handle();
            let view = interruptible(cancel, orchestrator.poll(&job))
                .await
                .map_err(|err| err.with_handle(&job))?;
            report_poll(&handle.job_id, view, output).await?;
        }
        Command::Complete(handle) => {
            let job = handle.handle();
            let ack = interruptible(cancel, orchestrator.complete(&job))
                .await
                .map_err(|err| err.with_handle(&job))?;
            println!("{}", json!({ "job_id": handle.job_id, "ack": ack }));
        }
    }
    Ok(())
}

async fn report_poll(
    job_id: &str,
    view: JobStatusView,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    match view {
        JobStatusView::Processing { status, progress } => {
            let report = json!({
                "job_id": job_id,
                "status": "processing",
                "remote_status": status,
                "progress": progress,
            });
            println!("{report}");
        }
        JobStatusView::Complete(result) => {
            let mut report = json!({
                "job_id": job_id,
                "status": "complete",
                "media_type": result.media_type,
                "bytes": result.bytes.len(),
            });
            if let Some(output) = output {
                let path = save(&result, Some(output)).await?;
                report["path"] = json!(path.display().to_string());
            }
            println!("{report}");
        }
    }
    Ok(())
}

/// Abandon a single request, including its retry waits, once `cancel`
/// fires. `run` and `resume` watch the token themselves.
async fn interruptible<T>(
    cancel: &CancellationToken,
    step: impl Future<Output = Result<T, JobError>>,
) -> Result<T, JobError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled { handle: None }),
        result = step => result,
    }
}

/// Point the user at `resume` when a wait gives up on a live job.
fn explain(err: JobError) -> anyhow::Error {
    let resumable = match &err {
        JobError::Timeout { handle, .. } => Some(handle),
        JobError::Cancelled {
            handle: Some(handle),
        } => Some(handle),
        _ => None,
    };
    match resumable {
        Some(handle) => {
            let hint = resume_hint(handle);
            anyhow::Error::new(err).context(hint)
        }
        None => err.into(),
    }
}

fn resume_hint(handle: &JobHandle) -> String {
    format!(
        "job {handle} is still running remotely; resume with `vidgen resume {} --model {}`",
        handle.id(),
        handle.model()
    )
}

/// Write the artifact to `output`, or to a timestamped file in the
/// current directory.
async fn save(result: &JobResult, output: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = output.unwrap_or_else(|| default_output_path(result, Utc::now()));
    tokio::fs::write(&path, &result.bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        bytes = result.bytes.len(),
        media_type = %result.media_type,
        "Saved video",
    );
    Ok(path)
}

pub fn default_output_path(result: &JobResult, now: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!(
        "vidgen-{}.{}",
        now.format("%Y%m%d-%H%M%S"),
        result.file_extension()
    ))
}
