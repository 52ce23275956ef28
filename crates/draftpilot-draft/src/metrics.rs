//! Draft client metrics.
//!
//! Provides standardized metrics for monitoring draft server calls:
//! - Request counters by endpoint and outcome
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

use crate::types::Endpoint;

/// Metric name constants for consistency.
pub mod names {
    /// Total draft server requests by endpoint and outcome.
    pub const REQUESTS_TOTAL: &str = "draft_requests_total";

    /// Total retry attempts by endpoint.
    pub const RETRIES_TOTAL: &str = "draft_retries_total";

    /// Request latency in seconds by endpoint.
    pub const LATENCY_SECONDS: &str = "draft_latency_seconds";
}

/// Record metrics for a completed attempt.
pub fn record_request(endpoint: Endpoint, outcome: &'static str, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "endpoint" => endpoint.path(),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "endpoint" => endpoint.path()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(endpoint: Endpoint) {
    counter!(
        names::RETRIES_TOTAL,
        "endpoint" => endpoint.path()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::RETRIES_TOTAL.contains("retries"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
    }
}
