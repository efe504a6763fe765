//! Bounded exponential backoff with jitter for retryable job errors.
//!
//! Callers retry a request while [`JobError::is_retryable`] holds and
//! fewer than [`RetryPolicy::max_attempts`] attempts have been made,
//! sleeping [`RetryPolicy::delay_for`] between attempts.

use std::time::Duration;

use rand::Rng;

use crate::error::JobError;

/// Tunable parameters for the retry strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first. `1` disables retry.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the computed backoff. Rate-limit hints are not capped.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Relative jitter applied to the backoff, e.g. `0.2` for +/-20%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

/// Calculate the next backoff delay from the current delay and policy.
///
/// The result is clamped to [`RetryPolicy::max_delay`].
pub fn next_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_delay)
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` attempts failed
    /// with `error`.
    pub fn should_retry(&self, attempt: u32, error: &JobError) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Un-jittered backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let mut delay = self.initial_delay.min(self.max_delay);
        for _ in 1..attempt {
            delay = next_delay(delay, self);
        }
        delay
    }

    /// Spread `base` by up to +/-[`Self::jitter`], never exceeding
    /// [`Self::max_delay`].
    pub fn jittered<R: Rng + ?Sized>(&self, base: Duration, rng: &mut R) -> Duration {
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = 1.0 + rng.random_range(-self.jitter..=self.jitter);
        base.mul_f64(factor.max(0.0)).min(self.max_delay)
    }

    /// How long to wait after attempt `attempt` failed with `error`.
    ///
    /// A rate-limit reset hint is honoured exactly; everything else gets
    /// jittered exponential backoff.
    pub fn delay_for(&self, attempt: u32, error: &JobError) -> Duration {
        match error {
            JobError::RateLimited {
                retry_after: Some(hint),
                ..
            } => *hint,
            _ => self.jittered(self.backoff(attempt), &mut rand::rng()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn next_delay_doubles() {
        let policy = RetryPolicy::default();
        let d = next_delay(Duration::from_secs(1), &policy);
        assert_eq!(d, Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        let d = next_delay(Duration::from_secs(8), &policy);
        assert_eq!(d, Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(1),
            ..Default::default()
        };
        let expected = [1, 2, 4, 8, 16, 30, 30];

        for (i, &expected_secs) in expected.iter().enumerate() {
            assert_eq!(policy.backoff(i as u32 + 1).as_secs(), expected_secs);
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let base = Duration::from_secs(4);

        for _ in 0..200 {
            let d = policy.jittered(base, &mut rng);
            assert!(d >= base.mul_f64(0.8) && d <= base.mul_f64(1.2), "{d:?}");
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..Default::default()
        };
        let err = JobError::Transient("503".into());
        assert_eq!(policy.delay_for(1, &err), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3, &err), Duration::from_secs(2));
    }

    #[test]
    fn rate_limit_hint_is_honoured_uncapped() {
        let policy = RetryPolicy {
            max_delay: Duration::from_secs(5),
            ..Default::default()
        };
        let err = JobError::RateLimited {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(policy.delay_for(1, &err), Duration::from_secs(42));
    }

    #[test]
    fn only_retryable_errors_within_budget_are_retried() {
        let policy = RetryPolicy::default();
        let transient = JobError::Transient("reset".into());
        let auth = JobError::Auth("bad key".into());

        assert!(policy.should_retry(1, &transient));
        assert!(!policy.should_retry(4, &transient));
        assert!(!policy.should_retry(1, &auth));
        assert!(!RetryPolicy::no_retry().should_retry(1, &transient));
    }
}
