//! Metrics definitions for the authorizer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authorizer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: 2 values (allow, deny)
//! - `reason`: bounded by `AuthorizerError::reason()` plus "ok"
//! - `status`: 2 values for JWKS fetches (success, error)
//! - `result`: 2 values for cache lookups (hit, miss)
//! - `method`, `endpoint`: normalized, see [`record_http_request`]
//!
//! Issuers, api ids, key ids and subjects are never used as label values.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Configures histogram
/// buckets for the three latency families the authorizer reports:
/// - Decisions: dominated by signature verification on cache hits
/// - JWKS fetches: one network round trip per issuer, bounded by the fetch timeout
/// - HTTP requests: decision latency plus framework overhead
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_decision".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set decision buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_jwks_fetch".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_http_request".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Decision Metrics
// ============================================================================

/// Record an authorization decision.
///
/// Metric: `authorizer_decisions_total`, `authorizer_decision_duration_seconds`
/// Labels: `outcome` (allow/deny), `reason` ("ok" or an error reason label)
pub fn record_decision(allowed: bool, reason: &'static str, duration: Duration) {
    let outcome = if allowed { "allow" } else { "deny" };

    histogram!("authorizer_decision_duration_seconds",
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_decisions_total",
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
}

// ============================================================================
// Key Set Metrics
// ============================================================================

/// Record a JWKS fetch attempt.
///
/// Metric: `authorizer_jwks_fetch_total`, `authorizer_jwks_fetch_duration_seconds`
/// Labels: `status` (success/error)
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("authorizer_jwks_fetch_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_jwks_fetch_total",
        "status" => status
    )
    .increment(1);
}

/// Record a key set cache lookup.
///
/// Metric: `authorizer_key_cache_lookups_total`
/// Labels: `result` (hit/miss)
pub fn record_key_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };

    counter!("authorizer_key_cache_lookups_total",
        "result" => result
    )
    .increment(1);
}

/// Set the number of issuers with a cached key set.
///
/// Metric: `authorizer_key_cache_issuers`
pub fn set_cached_issuers(count: usize) {
    // Precision loss is irrelevant at realistic issuer counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("authorizer_key_cache_issuers").set(count as f64);
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `authorizer_http_requests_total`, `authorizer_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` (histogram) / `status_code` (counter)
///
/// This captures ALL HTTP responses including framework-level errors like:
/// - 415 Unsupported Media Type (wrong Content-Type)
/// - 400/422 (JSON parse errors)
/// - 404 Not Found
/// - 405 Method Not Allowed
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    // Normalize endpoint to prevent cardinality explosion
    let normalized_endpoint = normalize_endpoint(endpoint);

    // Determine status category for simplified querying
    let status = categorize_status_code(status_code);

    histogram!("authorizer_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_http_requests_total",
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

/// Normalize endpoint path to prevent label cardinality explosion.
///
/// The router has no dynamic segments, so anything unknown is "/other".
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/v1/authorize" => "/v1/authorize",
        _ => "/other",
    }
}
