//! Backoff and failure tracking for server supervision.

use std::time::Duration;
use tracing::{debug, warn};

/// Capped exponential backoff with a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay before the first retry (doubles each attempt).
    pub base: Duration,
    /// Maximum delay between attempts.
    pub max: Duration,
    /// Total attempts allowed.
    pub attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, attempts: u32) -> Self {
        Self {
            base,
            max,
            attempts,
        }
    }

    /// Delay after the given zero-based attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Consecutive-failure counter for the health monitor.
///
/// Log output is suppressed after `max_logged_failures` so a dead server does
/// not flood the log between restart decisions.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful check (resets the count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            debug!(
                "Health check recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed check. Returns `true` if it should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else if self.consecutive_failures == self.max_logged_failures + 1 {
            self.suppressed = true;
            warn!(
                "Suppressing further health check logs after {} consecutive failures",
                self.max_logged_failures
            );
            false
        } else {
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the count has reached `threshold`.
    pub fn reached(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold
    }
}
