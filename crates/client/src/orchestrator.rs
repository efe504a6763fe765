//! Async job orchestrator: quote -> submit -> poll -> complete.
//!
//! [`JobOrchestrator`] exposes each step on its own and composes them in
//! [`JobOrchestrator::run_to_completion`], which hides the polling loop
//! behind a single cancellable call. The orchestrator holds no per-job
//! state, so concurrent runs can share one instance; each run owns its
//! [`JobHandle`] exclusively.

use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use vidgen_core::catalog::{self, ModelCatalog};
use vidgen_core::decode::{decode_poll, decode_quote, decode_submit};
use vidgen_core::error::{classify_response, JobError};
use vidgen_core::lifecycle::JobState;
use vidgen_core::retry::RetryPolicy;
use vidgen_core::transport::{Endpoint, Transport, TransportResponse};
use vidgen_core::types::{Ack, JobHandle, JobQuote, JobRequest, JobResult, JobStatusView};

/// Statuses the completion endpoint returns for handles whose storage is
/// already gone. Treated as success.
const ALREADY_RELEASED_STATUSES: &[u16] = &[404, 410];

/// Upper bound on the release call once the artifact is in hand,
/// retries and rate-limit waits included.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Stand-in for instants that would overflow; roughly 30 years out.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timing of a `run_to_completion` / `resume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Wait before each poll.
    pub poll_interval: Duration,
    /// Wall-clock budget for the whole run, measured from its start.
    pub timeout: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl RunOptions {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

/// Drives jobs against a remote service through a [`Transport`].
pub struct JobOrchestrator<T> {
    transport: T,
    retry: RetryPolicy,
    catalog: Option<ModelCatalog>,
}

impl<T: Transport> JobOrchestrator<T> {
    /// Create an orchestrator with the default [`RetryPolicy`] and no
    /// model catalog.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            catalog: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Restrict requests to the models and selectors in `catalog`.
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn catalog(&self) -> Option<&ModelCatalog> {
        self.catalog.as_ref()
    }

    /// Local validation applied before quote and submit.
    pub fn validate(&self, request: &JobRequest) -> Result<(), JobError> {
        catalog::validate_request(request)?;
        if let Some(catalog) = &self.catalog {
            catalog.check(request)?;
        }
        Ok(())
    }

    /// Ask the service what `request` would cost. No side effects.
    pub async fn quote(&self, request: &JobRequest) -> Result<JobQuote, JobError> {
        self.validate(request)?;
        let response = self
            .send_with_retry(Endpoint::Quote, &request.to_wire(), &[])
            .await?;
        let quote = decode_quote(&response)?;

        tracing::info!(
            model = %request.model,
            price = quote.price,
            currency = quote.currency.as_deref().unwrap_or("-"),
            "Quote received",
        );
        Ok(quote)
    }

    /// Queue `request` on the service and return its handle.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, JobError> {
        self.validate(request)?;
        let response = self
            .send_with_retry(Endpoint::Submit, &request.to_wire(), &[])
            .await?;
        let handle = decode_submit(&request.model, &response)?;

        tracing::info!(job_id = %handle, model = %handle.model(), "Job submitted");
        Ok(handle)
    }

    /// Ask once for the job's status. Safe to repeat; the remote job does
    /// not change state because of a poll.
    ///
    /// Retryable failures are retried within the retry budget before being
    /// surfaced.
    pub async fn poll(&self, handle: &JobHandle) -> Result<JobStatusView, JobError> {
        let response = self
            .send_with_retry(Endpoint::Status, &handle.to_wire(), &[])
            .await?;
        decode_poll(handle, &response)
    }

    /// Release the job's remote storage.
    ///
    /// Idempotent: a handle the service no longer knows yields
    /// [`Ack::AlreadyReleased`] rather than an error.
    pub async fn complete(&self, handle: &JobHandle) -> Result<Ack, JobError> {
        let response = self
            .send_with_retry(
                Endpoint::Complete,
                &handle.to_wire(),
                ALREADY_RELEASED_STATUSES,
            )
            .await?;

        if response.is_success() {
            tracing::info!(job_id = %handle, "Job storage released");
            Ok(Ack::Released)
        } else {
            tracing::info!(
                job_id = %handle,
                status = response.status,
                "Job storage already released",
            );
            Ok(Ack::AlreadyReleased)
        }
    }

    /// Submit `request`, poll every `options.poll_interval` until the
    /// artifact arrives, then release the remote storage.
    ///
    /// Returns exactly one outcome:
    /// - the artifact, even if the final release call fails, is cancelled
    ///   or exceeds [`RELEASE_TIMEOUT`] (logged);
    /// - [`JobError::Timeout`] once `options.timeout` has elapsed, without
    ///   releasing the job, so it can still be [`resume`](Self::resume)d;
    /// - [`JobError::Cancelled`] as soon as `cancel` fires;
    /// - the first fatal submit or poll error.
    pub async fn run_to_completion(
        &self,
        request: &JobRequest,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<JobResult, JobError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("job_run", %run_id, model = %request.model);

        async {
            let started = Instant::now();
            let mut run = RunTracker::new(JobState::Created);

            let submitted = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(JobError::Cancelled { handle: None }),
                result = self.submit(request) => result,
            };
            let handle = match submitted {
                Ok(handle) => handle,
                Err(err) => {
                    run.fail(&err);
                    return Err(err);
                }
            };
            run.advance(JobState::Processing)?;

            self.drive(&handle, options, cancel, started, run).await
        }
        .instrument(span)
        .await
    }

    /// Poll an already-submitted job to completion and release it.
    ///
    /// Same outcomes as [`run_to_completion`](Self::run_to_completion); the
    /// timeout budget starts now.
    pub async fn resume(
        &self,
        handle: &JobHandle,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<JobResult, JobError> {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "job_resume",
            %run_id,
            job_id = %handle,
            model = %handle.model(),
        );

        self.drive(
            handle,
            options,
            cancel,
            Instant::now(),
            RunTracker::new(JobState::Processing),
        )
        .instrument(span)
        .await
    }

    // ---- private helpers ----

    /// The poll loop shared by `run_to_completion` and `resume`.
    async fn drive(
        &self,
        handle: &JobHandle,
        options: &RunOptions,
        cancel: &CancellationToken,
        started: Instant,
        mut run: RunTracker,
    ) -> Result<JobResult, JobError> {
        let deadline = instant_after(started, options.timeout);

        loop {
            // Never sleep past the deadline.
            let wake = instant_after(Instant::now(), options.poll_interval).min(deadline);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(handle, &run)),
                _ = tokio::time::sleep_until(wake) => {}
            }
            if Instant::now() >= deadline {
                return Err(timed_out(handle, started, &run));
            }

            run.polls += 1;
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(handle, &run)),
                result = tokio::time::timeout_at(deadline, self.poll(handle)) => result,
            };

            match polled {
                Err(_elapsed) => return Err(timed_out(handle, started, &run)),
                Ok(Ok(JobStatusView::Processing { status, progress })) => {
                    tracing::debug!(
                        job_id = %handle,
                        poll = run.polls,
                        status = status.as_deref().unwrap_or("-"),
                        progress,
                        "Job still processing",
                    );
                }
                Ok(Ok(JobStatusView::Complete(result))) => {
                    run.advance(JobState::Complete)?;
                    tracing::info!(
                        job_id = %handle,
                        polls = run.polls,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        media_type = %result.media_type,
                        bytes = result.bytes.len(),
                        "Job complete",
                    );
                    self.release(handle, cancel).await;
                    return Ok(result);
                }
                Ok(Err(err)) => {
                    run.fail(&err);
                    tracing::warn!(
                        job_id = %handle,
                        polls = run.polls,
                        kind = err.kind(),
                        error = %err,
                        "Polling failed",
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Best-effort completion call once the artifact is in hand. Bounded by
    /// [`RELEASE_TIMEOUT`] and abandoned on cancellation.
    async fn release(&self, handle: &JobHandle, cancel: &CancellationToken) {
        let released = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(job_id = %handle, "Cancelled before job storage was released");
                return;
            }
            result = tokio::time::timeout(RELEASE_TIMEOUT, self.complete(handle)) => result,
        };

        match released {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::warn!(
                job_id = %handle,
                error = %err,
                "Failed to release job storage after receiving the artifact",
            ),
            Err(_elapsed) => tracing::warn!(
                job_id = %handle,
                timeout_ms = RELEASE_TIMEOUT.as_millis() as u64,
                "Gave up releasing job storage after receiving the artifact",
            ),
        }
    }

    /// Send one request, retrying retryable failures per the retry policy.
    ///
    /// 2xx responses and statuses listed in `accept` are returned as-is;
    /// everything else is classified into a [`JobError`].
    async fn send_with_retry(
        &self,
        endpoint: Endpoint,
        body: &serde_json::Value,
        accept: &[u16],
    ) -> Result<TransportResponse, JobError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let error = match self.transport.send(endpoint, body).await {
                Ok(response) if response.is_success() || accept.contains(&response.status) => {
                    return Ok(response);
                }
                Ok(response) => classify_response(&response, Utc::now()),
                Err(err) => err,
            };

            if !self.retry.should_retry(attempt, &error) {
                if error.is_retryable() {
                    tracing::warn!(
                        endpoint = %endpoint,
                        attempts = attempt,
                        error = %error,
                        "Retry budget exhausted",
                    );
                }
                return Err(error);
            }

            let delay = self.retry.delay_for(attempt, &error);
            tracing::warn!(
                endpoint = %endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Request failed, retrying",
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Lifecycle bookkeeping for one run.
struct RunTracker {
    state: JobState,
    polls: u32,
}

impl RunTracker {
    fn new(state: JobState) -> Self {
        Self { state, polls: 0 }
    }

    fn advance(&mut self, next: JobState) -> Result<(), JobError> {
        let previous = self.state;
        self.state = previous.transition(next)?;
        tracing::debug!(from = %previous, to = %next, "Job state changed");
        Ok(())
    }

    /// Record a fatal error. Cancellation and local timeouts leave the
    /// remote job alive, so they do not fail it.
    fn fail(&mut self, error: &JobError) {
        if matches!(error, JobError::Cancelled { .. } | JobError::Timeout { .. }) {
            return;
        }
        if let Err(err) = self.advance(JobState::Failed) {
            tracing::warn!(error = %err, "Ignoring failure on a finished job");
        }
    }
}

/// `start + wait`, saturating to a far-future instant instead of overflowing.
fn instant_after(start: Instant, wait: Duration) -> Instant {
    start
        .checked_add(wait)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

fn cancelled(handle: &JobHandle, run: &RunTracker) -> JobError {
    tracing::info!(
        job_id = %handle,
        polls = run.polls,
        state = %run.state,
        "Run cancelled, remote job left in place",
    );
    JobError::Cancelled {
        handle: Some(handle.clone()),
    }
}

fn timed_out(handle: &JobHandle, started: Instant, run: &RunTracker) -> JobError {
    let elapsed = started.elapsed();
    tracing::warn!(
        job_id = %handle,
        polls = run.polls,
        elapsed_ms = elapsed.as_millis() as u64,
        "Run timed out, remote job left in place",
    );
    JobError::Timeout {
        handle: handle.clone(),
        elapsed,
    }
}
