//! Metrics definitions for the Expert Gateway.
//!
//! All metrics follow Prometheus naming conventions:
//! - `gw_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed route table, anything else is `/other`
//! - `outcome`: bounded by code (issued/rejected, valid/invalid/expired)
//! - `service`: `llm` or `search`
//!
//! Outcome labels distinguish failure causes for operators only. They are
//! never part of a client response.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by the
/// `/metrics` endpoint.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("gw_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
                30.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // LLM completions routinely take seconds
        .set_buckets_for_metric(
            Matcher::Prefix("gw_upstream_request".to_string()),
            &[
                0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.000, 20.000, 30.000,
            ],
        )
        .map_err(|e| format!("Failed to set upstream request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `gw_http_requests_total`, `gw_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("gw_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("gw_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route table.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/auth/validate" => "/api/auth/validate",
        "/api/auth/logout" => "/api/auth/logout",
        "/api/search" => "/api/search",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record a one-time token exchange attempt.
///
/// Metric: `gw_token_exchanges_total`
/// Labels: `outcome` (issued, rejected)
pub fn record_token_exchange(issued: bool) {
    let outcome = if issued { "issued" } else { "rejected" };
    counter!("gw_token_exchanges_total", "outcome" => outcome).increment(1);
}

/// Record a session validation.
///
/// Metric: `gw_session_validations_total`
/// Labels: `outcome` (valid, invalid, expired)
pub fn record_session_validation(outcome: &'static str) {
    counter!("gw_session_validations_total", "outcome" => outcome).increment(1);
}

/// Record an explicit session revocation.
///
/// Metric: `gw_sessions_revoked_total`
pub fn record_session_revoked() {
    counter!("gw_sessions_revoked_total").increment(1);
}

/// Record sessions removed by the background sweeper.
///
/// Metric: `gw_sessions_swept_total`
pub fn record_sessions_swept(count: usize) {
    counter!("gw_sessions_swept_total").increment(count as u64);
}

/// Update the token store gauges.
///
/// Metrics: `gw_active_sessions`, `gw_unused_one_time_tokens`
pub fn set_token_store_sizes(active_sessions: usize, unused_tokens: usize) {
    gauge!("gw_active_sessions").set(active_sessions as f64);
    gauge!("gw_unused_one_time_tokens").set(unused_tokens as f64);
}

// ============================================================================
// Upstream Metrics
// ============================================================================

/// Record a call to an upstream API.
///
/// Metric: `gw_upstream_requests_total`, `gw_upstream_request_duration_seconds`
/// Labels: `service` (llm, search), `status` (success, error)
pub fn record_upstream_request(service: &'static str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    histogram!("gw_upstream_request_duration_seconds", "service" => service)
        .record(duration.as_secs_f64());

    counter!("gw_upstream_requests_total",
        "service" => service,
        "status" => status
    )
    .increment(1);
}
