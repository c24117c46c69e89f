//! Metrics definitions for the dashboard service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `dashboard_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: route templates, unknown paths collapse to `/other`
//! - `status`: success, error, timeout
//! - `decision`/`reason`: gate outcomes and `CredentialError::reason` values
//! - `operation`: bounded by code (item store and identity provider calls)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used by `/metrics`.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("dashboard_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("dashboard_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("dashboard_item_store".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500,
            ],
        )
        .map_err(|e| format!("Failed to set item store buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("dashboard_identity_request".to_string()),
            &[
                0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set identity request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `dashboard_http_requests_total`, `dashboard_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
///
/// Captures every response, including gate denials and framework-level
/// rejections (400 JSON parse errors, 404, 405, 415).
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("dashboard_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("dashboard_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=399 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize a request path to a bounded route template.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" | "/health" | "/ready" | "/metrics" | "/login" | "/signup" | "/confirm"
        | "/dashboard" | "/api/me" | "/api/items" | "/api/auth/login" | "/api/auth/signup"
        | "/api/auth/confirm" | "/api/auth/logout" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/api/items/") {
        if !rest.is_empty() && !rest.contains('/') {
            return "/api/items/{id}".to_string();
        }
    }

    "/other".to_string()
}

// ============================================================================
// Authorization Gate Metrics
// ============================================================================

/// Record a gate decision
///
/// Metric: `dashboard_gate_decisions_total`
/// Labels: `decision` (allow_public, allow, deny_api, deny_page), `reason`
pub fn record_gate_decision(decision: &str, reason: &str) {
    counter!("dashboard_gate_decisions_total",
        "decision" => decision.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a key set fetch
///
/// Metric: `dashboard_jwks_refresh_total`, `dashboard_jwks_refresh_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("dashboard_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("dashboard_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Item Store Metrics
// ============================================================================

/// Record an item store operation
///
/// Metric: `dashboard_item_store_operations_total`, `dashboard_item_store_duration_seconds`
/// Labels: `backend`, `operation`, `status`
pub fn record_item_store_op(backend: &str, operation: &str, status: &str, duration: Duration) {
    histogram!("dashboard_item_store_duration_seconds",
        "backend" => backend.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("dashboard_item_store_operations_total",
        "backend" => backend.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Identity Provider Metrics
// ============================================================================

/// Record a call to the identity provider
///
/// Metric: `dashboard_identity_requests_total`, `dashboard_identity_request_duration_seconds`
/// Labels: `operation` (login, signup, confirm), `status`
pub fn record_identity_request(operation: &str, status: &str, duration: Duration) {
    histogram!("dashboard_identity_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("dashboard_identity_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
