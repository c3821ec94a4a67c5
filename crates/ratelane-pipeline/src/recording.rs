// SPDX-FileCopyrightText: 2026 Ratelane Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so whichever recorder the binary installs
//! collects these metrics. Without a recorder every call is a no-op.

use metrics::{describe_counter, describe_histogram};

/// Register all Ratelane metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "ratelane_messages_total",
        "Messages that reached a processing outcome, by status"
    );
    describe_counter!("ratelane_batches_dispatched_total", "Batches accepted");
    describe_counter!(
        "ratelane_batches_aggregated_total",
        "Batches whose results were aggregated"
    );
    describe_counter!(
        "ratelane_completion_signals_total",
        "Completion signals consumed, by result"
    );
    describe_counter!(
        "ratelane_webhook_deliveries_total",
        "Webhook deliveries, by status"
    );
    describe_histogram!(
        "ratelane_gateway_latency_seconds",
        "Gateway request latency in seconds"
    );
}

/// Record a message processing outcome (`completed`, `failed`, `retrying`, ...).
pub fn record_message(status: &str) {
    metrics::counter!("ratelane_messages_total", "status" => status.to_string()).increment(1);
}

pub fn record_batch_dispatched() {
    metrics::counter!("ratelane_batches_dispatched_total").increment(1);
}

pub fn record_batch_aggregated() {
    metrics::counter!("ratelane_batches_aggregated_total").increment(1);
}

/// Record how a completion signal was handled (`aggregated`, `duplicate`, `dropped`, `error`).
pub fn record_completion_signal(result: &'static str) {
    metrics::counter!("ratelane_completion_signals_total", "result" => result).increment(1);
}

pub fn record_webhook(status: &'static str) {
    metrics::counter!("ratelane_webhook_deliveries_total", "status" => status).increment(1);
}

/// Record gateway latency.
pub fn record_gateway_latency(seconds: f64) {
    metrics::histogram!("ratelane_gateway_latency_seconds").record(seconds);
}
