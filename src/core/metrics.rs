// src/core/metrics.rs

//! Defines and registers Prometheus metrics for session monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, TextEncoder, register_counter, register_counter_vec};

lazy_static! {
    /// The number of times the controller asked the transport to connect.
    pub static ref CONNECT_ATTEMPTS_TOTAL: Counter =
        register_counter!("tether_connect_attempts_total", "Total number of transport connect calls.").unwrap();
    /// Logon answers received from the service, labeled by result code.
    pub static ref LOGONS_TOTAL: CounterVec =
        register_counter_vec!("tether_logons_total", "Total number of logon results, labeled by result.", &["result"]).unwrap();
    /// Reconnects scheduled after a network failure.
    pub static ref RECONNECTS_SCHEDULED_TOTAL: Counter =
        register_counter!("tether_reconnects_scheduled_total", "Total number of scheduled reconnects.").unwrap();
    /// Callback handlers that returned an error or panicked.
    pub static ref CALLBACK_HANDLER_FAILURES_TOTAL: Counter =
        register_counter!("tether_callback_handler_failures_total", "Total number of failed callback handler invocations.").unwrap();
    /// Subscriptions that could not be released.
    pub static ref SUBSCRIPTION_CLOSE_FAILURES_TOTAL: Counter =
        register_counter!("tether_subscription_close_failures_total", "Total number of failed subscription closes.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
