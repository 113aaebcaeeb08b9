//! Reddit API rate-limit window.
//!
//! Reddit reports its remaining call budget through the `X-Ratelimit-Remaining`
//! and `X-Ratelimit-Reset` response headers. When the budget hits zero the
//! window closes until `now + reset` seconds; every authenticated request
//! checks the window first and fails fast while it is closed.
//!
//! The resume timestamp is stored as unix seconds in an atomic so readers on
//! any task never block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;
use tracing::{debug, instrument, warn};

/// Header carrying the remaining number of calls in the current period.
pub const RATELIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying the seconds until the current period resets.
pub const RATELIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Upper bound for a server-announced reset, to prevent runaway lockouts.
const MAX_RESET: Duration = Duration::from_secs(3600);

/// Shared "do not call Reddit before" timestamp.
#[derive(Debug, Default)]
pub struct RateLimitWindow {
    resume_at: AtomicU64,
}

impl RateLimitWindow {
    /// Creates an open window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the unix second at which calls may resume (0 when never limited).
    #[must_use]
    pub fn resume_at(&self) -> u64 {
        self.resume_at.load(Ordering::Acquire)
    }

    /// Returns how long callers still have to wait, or `None` if the window is open.
    #[must_use]
    pub fn remaining_at(&self, now_secs: u64) -> Option<Duration> {
        let resume_at = self.resume_at();
        (now_secs < resume_at).then(|| Duration::from_secs(resume_at - now_secs))
    }

    /// Returns how long callers still have to wait right now.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(unix_now())
    }

    /// Closes the window until `now_secs + reset`.
    ///
    /// A later resume time already stored is never moved backwards.
    pub fn close_at(&self, now_secs: u64, reset: Duration) {
        let reset = reset.min(MAX_RESET);
        let resume_at = now_secs.saturating_add(reset.as_secs());
        let previous = self.resume_at.fetch_max(resume_at, Ordering::AcqRel);
        debug!(resume_at, previous, "rate limit window closed");
    }

    /// Records the rate-limit headers of a response.
    ///
    /// Returns `true` when the budget is exhausted and the window was closed.
    #[instrument(skip(self, headers))]
    pub fn record_headers(&self, headers: &HeaderMap) -> bool {
        let Some(usage) = parse_ratelimit_headers(headers) else {
            return false;
        };
        if usage.remaining > 0.0 {
            return false;
        }

        warn!(
            reset_secs = usage.reset.as_secs(),
            "Reddit rate limit exhausted; pausing API calls"
        );
        self.close_at(unix_now(), usage.reset);
        true
    }
}

/// Parsed rate-limit headers of a single response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitUsage {
    /// Calls left in the current period.
    pub remaining: f64,
    /// Time until the period resets.
    pub reset: Duration,
}

/// Parses Reddit's rate-limit headers.
///
/// Returns `None` when `X-Ratelimit-Remaining` is absent or unparseable.
/// Reddit sends the remaining count as a float (e.g. `"598.0"`); a missing or
/// invalid reset value is treated as zero seconds.
#[must_use]
pub fn parse_ratelimit_headers(headers: &HeaderMap) -> Option<RateLimitUsage> {
    let remaining = header_str(headers, RATELIMIT_REMAINING_HEADER)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())?;

    let reset = header_str(headers, RATELIMIT_RESET_HEADER)
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map_or(Duration::ZERO, Duration::from_secs_f64);

    Some(RateLimitUsage { remaining, reset })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Current unix time in whole seconds.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
