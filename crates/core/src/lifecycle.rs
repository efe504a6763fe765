//! Job lifecycle states and transition rules.

use std::fmt;

use crate::error::JobError;

/// Where a job is in its lifecycle, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// Request built, not yet accepted by the service.
    Created,
    /// Accepted by the service; polling has not yet observed the artifact.
    Processing,
    /// Artifact received. Terminal.
    Complete,
    /// A non-retryable error ended the job. Terminal.
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Processing => "processing",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    /// Returns the set of states that `self` may transition to.
    ///
    /// Transition rules:
    /// - `created`    -> `processing`, `failed`
    /// - `processing` -> `complete`, `failed`
    /// - `complete`, `failed` -> nothing
    pub fn valid_transitions(&self) -> &'static [JobState] {
        match self {
            JobState::Created => &[JobState::Processing, JobState::Failed],
            JobState::Processing => &[JobState::Complete, JobState::Failed],
            JobState::Complete | JobState::Failed => &[],
        }
    }

    /// Validate and perform a transition to `next`.
    pub fn transition(self, next: JobState) -> Result<JobState, JobError> {
        if self.valid_transitions().contains(&next) {
            Ok(next)
        } else {
            Err(JobError::Protocol(format!(
                "Cannot transition job from '{self}' to '{next}'. Allowed transitions: {:?}",
                self.valid_transitions()
            )))
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
