//! Prometheus metrics for the gateway.
//!
//! Metrics are exposed on a dedicated listener when `server.metrics_port` is
//! non-zero. Recording functions are no-ops until [`init_metrics`] installs
//! the exporter.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `mptcpkit_script_runs_total` - Endpoint script invocations (labels: script, outcome)
//! - `mptcpkit_auth_failures_total` - Rejected requests at the auth gate (labels: reason)
//! - `mptcpkit_security_rejections_total` - Requests refused by the security layer (labels: reason)
//!
//! ## Histograms
//! - `mptcpkit_script_duration_seconds` - Wall time of a script invocation (labels: script)

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const SCRIPT_RUNS_TOTAL: &str = "mptcpkit_script_runs_total";
    pub const AUTH_FAILURES_TOTAL: &str = "mptcpkit_auth_failures_total";
    pub const SECURITY_REJECTIONS_TOTAL: &str = "mptcpkit_security_rejections_total";
    pub const SCRIPT_DURATION_SECONDS: &str = "mptcpkit_script_duration_seconds";
}

/// Install the Prometheus exporter listening on `metrics_addr`.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (address in use,
/// recorder already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::SCRIPT_RUNS_TOTAL,
        "Total number of endpoint script invocations"
    );
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Total number of requests rejected for a missing or wrong API key"
    );
    describe_counter!(
        names::SECURITY_REJECTIONS_TOTAL,
        "Total number of requests refused or redirected by the security layer"
    );
    describe_histogram!(
        names::SCRIPT_DURATION_SECONDS,
        "Endpoint script wall time in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any error but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a script invocation. `outcome` is one of `success`, `failure`,
/// `timeout` or `spawn_error`.
pub fn record_script_run(script: &str, outcome: &'static str) {
    counter!(names::SCRIPT_RUNS_TOTAL, "script" => script.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_script_duration(script: &str, duration_secs: f64) {
    histogram!(names::SCRIPT_DURATION_SECONDS, "script" => script.to_string())
        .record(duration_secs);
}

/// Record an authentication failure (`missing` or `invalid` key).
pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Record a security layer rejection (`bad_host` or `ssl_redirect`).
pub fn record_security_rejection(reason: &'static str) {
    counter!(names::SECURITY_REJECTIONS_TOTAL, "reason" => reason).increment(1);
}
