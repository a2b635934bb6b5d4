//! Metrics collection and exposition.
//!
//! # Metrics
//! - `blog_requests_rate_limited_total` (counter): rejections by rule
//! - `blog_auth_failures_total` (counter): failed issuance/verification by reason
//! - `blog_tokens_issued_total` (counter): tokens handed out by `/auth`
//! - `blog_requests_timed_out_total` (counter): responses replaced by a timeout
//! - `blog_crashes_total` (counter): faults contained by the crash guard
//! - `blog_alert_dispatch_failures_total` (counter): crash alerts that failed to send
//!
//! Recording is a no-op until a recorder is installed, so tests and
//! embedders that never call [`init_metrics`] pay nothing.

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rate_limited(rule: &str) {
    counter!("blog_requests_rate_limited_total", "rule" => rule.to_string()).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("blog_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_token_issued() {
    counter!("blog_tokens_issued_total").increment(1);
}

pub fn record_timeout() {
    counter!("blog_requests_timed_out_total").increment(1);
}

pub fn record_crash() {
    counter!("blog_crashes_total").increment(1);
}

pub fn record_alert_failure() {
    counter!("blog_alert_dispatch_failures_total").increment(1);
}
