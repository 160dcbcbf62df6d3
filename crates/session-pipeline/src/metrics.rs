//! Pipeline metrics
//!
//! - `session_refresh_total` (counter): label `outcome`
//! - `session_sign_out_total` (counter): label `reason`
//! - `session_retry_total` (counter)
//!
//! Without an installed recorder every call is a no-op.

/// Record the outcome of one refresh exchange: `success` or a
/// `RefreshFailure` label.
pub fn record_refresh(outcome: &str) {
    metrics::counter!("session_refresh_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record a completed sign-out.
pub fn record_sign_out(reason: &str) {
    metrics::counter!("session_sign_out_total", "reason" => reason.to_string()).increment(1);
}

/// Record a request re-issued after a refresh.
pub fn record_retry() {
    metrics::counter!("session_retry_total").increment(1);
}
