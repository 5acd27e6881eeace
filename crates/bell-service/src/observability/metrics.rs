//! Metrics definitions for the relay service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `bell_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `endpoint`: parameterized paths, unknown paths collapse to `/other`
//! - `message_type`: the seven signaling message kinds
//! - `transition`, `reason`, `outcome`: fixed by code
//! - `operation`: one value per repository query

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("bell_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("bell_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("bell_poll_delivered_messages".to_string()),
            &[0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0],
        )
        .map_err(|e| format!("Failed to set poll batch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("bell_notification_duration".to_string()),
            &[0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set notification buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `bell_http_requests_total`, `bell_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("bell_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("bell_http_requests_total",
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
/// Room ids and call ids are replaced with placeholders.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/" | "/health" | "/ready" | "/metrics" | "/api/signaling/send"
        | "/api/signaling/end-call" | "/api/calls/history" | "/api/calls/stats" => {
            path.to_string()
        }
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    let parts: Vec<&str> = path.split('/').collect();

    // ["", "api", <group>, <action>?, <id>]
    match parts.as_slice() {
        ["", "api", "signaling", "poll", _] => "/api/signaling/poll/{room_id}".to_string(),
        ["", "api", "call", "info", _] => "/api/call/info/{room_id}".to_string(),
        ["", "api", "calls", _] => "/api/calls/{call_id}".to_string(),
        _ => "/other".to_string(),
    }
}

// ============================================================================
// Relay Metrics
// ============================================================================

/// Record an accepted signaling message.
///
/// Metric: `bell_signals_sent_total`
/// Labels: `message_type`, `sender`
pub fn record_signal_sent(message_type: &'static str, sender: &'static str) {
    counter!("bell_signals_sent_total",
        "message_type" => message_type,
        "sender" => sender
    )
    .increment(1);
}

/// Record how many messages one poll claimed.
///
/// Metric: `bell_poll_delivered_messages`
pub fn record_poll_batch(delivered: usize) {
    histogram!("bell_poll_delivered_messages").record(delivered as f64);
}

/// Record a ring refused before a call record was created.
///
/// Metric: `bell_ring_rejected_total`
/// Labels: `reason` (blocked, unavailable)
pub fn record_ring_rejected(reason: &'static str) {
    counter!("bell_ring_rejected_total", "reason" => reason).increment(1);
}

// ============================================================================
// Call Lifecycle Metrics
// ============================================================================

/// Record a call record creation.
///
/// Metric: `bell_calls_started_total`
pub fn record_call_started() {
    counter!("bell_calls_started_total").increment(1);
}

/// Record a call status or duration update.
///
/// Metric: `bell_call_transitions_total`
/// Labels: `transition` (answered, ended), `outcome` (applied, unknown_call)
pub fn record_call_transition(transition: &'static str, outcome: &'static str) {
    counter!("bell_call_transitions_total",
        "transition" => transition,
        "outcome" => outcome
    )
    .increment(1);
}

// ============================================================================
// Notification Metrics
// ============================================================================

/// Record a notification outcome.
///
/// Metric: `bell_notifications_total`, `bell_notification_duration_seconds`
/// Labels: `outcome` (delivered, failed, timeout, dropped)
pub fn record_notification(outcome: &'static str, duration: Option<Duration>) {
    counter!("bell_notifications_total", "outcome" => outcome).increment(1);

    if let Some(duration) = duration {
        histogram!("bell_notification_duration_seconds", "outcome" => outcome)
            .record(duration.as_secs_f64());
    }
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record a repository query.
///
/// Metric: `bell_db_query_duration_seconds`, `bell_db_queries_total`
/// Labels: `operation`, `status` (success, error)
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("bell_db_query_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("bell_db_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}
