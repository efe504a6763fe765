//! Parsing of rate-limit reset hints from 429 responses.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// `Retry-After`: delta seconds or an HTTP date.
pub const RETRY_AFTER: &str = "retry-after";

/// `X-RateLimit-Reset`: unix epoch (seconds or milliseconds) or delta seconds.
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Reset values below this are delta seconds rather than epoch seconds.
const EPOCH_SECONDS_FLOOR: i64 = 1_000_000_000;

/// Reset values at or above this are epoch milliseconds.
const EPOCH_MILLIS_FLOOR: i64 = 100_000_000_000;

/// How long the service asked us to wait, measured from `now`.
///
/// `Retry-After` wins over `X-RateLimit-Reset` when both are present.
/// Reset instants in the past yield [`Duration::ZERO`]. Unparseable values
/// are ignored.
pub fn reset_hint(headers: &BTreeMap<String, String>, now: DateTime<Utc>) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| parse_retry_after(v, now))
        .or_else(|| {
            headers
                .get(RATE_LIMIT_RESET)
                .and_then(|v| parse_rate_limit_reset(v, now))
        })
}

/// Parse a `Retry-After` value.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some(until(at.with_timezone(&Utc), now))
}

/// Parse an `X-RateLimit-Reset` value.
pub fn parse_rate_limit_reset(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(n) = value.parse::<i64>() {
        if n < 0 {
            return None;
        }
        if n >= EPOCH_MILLIS_FLOOR {
            return DateTime::from_timestamp_millis(n).map(|at| until(at, now));
        }
        if n >= EPOCH_SECONDS_FLOOR {
            return DateTime::from_timestamp(n, 0).map(|at| until(at, now));
        }
        return Some(Duration::from_secs(n as u64));
    }

    // Negative, NaN and out-of-range values are ignored.
    Duration::try_from_secs_f64(value.parse::<f64>().ok()?).ok()
}

fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
