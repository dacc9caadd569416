//! Prometheus metrics for reconciliation and transaction flows.
//!
//! This module provides metrics for:
//! - Backend poll latency and failures
//! - On-chain resolution checks
//! - Category refreshes
//! - Market creation, stakes and claims
//! - Transaction confirmation latency
//! - HTTP request latency

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Backend poll latency metric name.
pub const METRIC_POLL_LATENCY: &str = "backend_poll_latency_ms";
/// HTTP request latency metric name.
pub const METRIC_HTTP_REQUEST_LATENCY: &str = "http_request_latency_ms";
/// Transaction confirmation latency metric name.
pub const METRIC_CONFIRMATION_LATENCY: &str = "tx_confirmation_latency_ms";
/// Failed backend polls counter metric name.
pub const METRIC_POLL_FAILURES: &str = "backend_poll_failures_total";
/// Resolution checks counter metric name.
pub const METRIC_RESOLUTION_CHECKS: &str = "resolution_checks_total";
/// Failed resolution reads counter metric name.
pub const METRIC_RESOLUTION_FAILURES: &str = "resolution_failures_total";
/// Markets marked resolved counter metric name.
pub const METRIC_MARKETS_RESOLVED: &str = "markets_resolved_total";
/// Category refreshes that changed something counter metric name.
pub const METRIC_RECATEGORIZATIONS: &str = "recategorizations_total";
/// Markets created counter metric name.
pub const METRIC_MARKETS_CREATED: &str = "markets_created_total";
/// Stakes submitted counter metric name.
pub const METRIC_STAKES_SUBMITTED: &str = "stakes_submitted_total";
/// Claims submitted counter metric name.
pub const METRIC_CLAIMS_SUBMITTED: &str = "claims_submitted_total";
/// Tracked markets gauge metric name.
pub const METRIC_MARKETS_TRACKED: &str = "markets_tracked";

/// Initialize all metric descriptions.
/// Call this once at startup, after installing a recorder.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_POLL_LATENCY,
        "Backend feed poll latency in milliseconds"
    );
    describe_histogram!(
        METRIC_HTTP_REQUEST_LATENCY,
        "HTTP request latency in milliseconds"
    );
    describe_histogram!(
        METRIC_CONFIRMATION_LATENCY,
        "Transaction confirmation latency in milliseconds"
    );

    // Counters
    describe_counter!(METRIC_POLL_FAILURES, "Total number of failed backend polls");
    describe_counter!(
        METRIC_RESOLUTION_CHECKS,
        "Total number of per-market on-chain resolution checks"
    );
    describe_counter!(
        METRIC_RESOLUTION_FAILURES,
        "Total number of failed per-epoch resolution reads"
    );
    describe_counter!(
        METRIC_MARKETS_RESOLVED,
        "Total number of markets marked resolved from chain data"
    );
    describe_counter!(
        METRIC_RECATEGORIZATIONS,
        "Total number of category refreshes that changed at least one market"
    );
    describe_counter!(METRIC_MARKETS_CREATED, "Total number of markets created");
    describe_counter!(METRIC_STAKES_SUBMITTED, "Total number of stakes submitted");
    describe_counter!(METRIC_CLAIMS_SUBMITTED, "Total number of claims submitted");

    describe_gauge!(METRIC_MARKETS_TRACKED, "Markets in the reconciled table");

    debug!("Metrics initialized");
}

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Record HTTP request latency.
pub fn record_http_latency(start: Instant, endpoint: &'static str) {
    histogram!(METRIC_HTTP_REQUEST_LATENCY, "endpoint" => endpoint).record(elapsed_ms(start));
}

/// Record transaction confirmation latency.
pub fn record_confirmation_latency(start: Instant) {
    histogram!(METRIC_CONFIRMATION_LATENCY).record(elapsed_ms(start));
}

/// Increment failed polls counter.
pub fn inc_poll_failures() {
    counter!(METRIC_POLL_FAILURES).increment(1);
}

/// Increment resolution checks counter.
pub fn inc_resolution_checks() {
    counter!(METRIC_RESOLUTION_CHECKS).increment(1);
}

/// Increment failed resolution reads counter.
pub fn inc_resolution_failures() {
    counter!(METRIC_RESOLUTION_FAILURES).increment(1);
}

/// Increment markets resolved counter.
pub fn inc_markets_resolved() {
    counter!(METRIC_MARKETS_RESOLVED).increment(1);
}

/// Increment recategorizations counter.
pub fn inc_recategorizations() {
    counter!(METRIC_RECATEGORIZATIONS).increment(1);
}

/// Increment markets created counter.
pub fn inc_markets_created() {
    counter!(METRIC_MARKETS_CREATED).increment(1);
}

/// Increment stakes submitted counter.
pub fn inc_stakes_submitted() {
    counter!(METRIC_STAKES_SUBMITTED).increment(1);
}

/// Increment claims submitted counter.
pub fn inc_claims_submitted() {
    counter!(METRIC_CLAIMS_SUBMITTED).increment(1);
}

/// Set the tracked markets gauge.
pub fn set_markets_tracked(count: usize) {
    gauge!(METRIC_MARKETS_TRACKED).set(count as f64);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        elapsed_ms(self.start)
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(elapsed_ms(self.start));
    }
}

/// Create a latency timer for a backend poll.
pub fn timer_poll() -> LatencyTimer {
    LatencyTimer::new(METRIC_POLL_LATENCY)
}
