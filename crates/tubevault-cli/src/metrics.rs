//! Metrics collection and export for the TubeVault watcher.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;
use tubevault_transport::ChannelState;

/// Metric names.
pub mod names {
    pub const EVENTS_TOTAL: &str = "tubevault_events_total";
    pub const CHANNEL_CONNECTED: &str = "tubevault_channel_connected";
    pub const CHANNEL_TRANSITIONS_TOTAL: &str = "tubevault_channel_transitions_total";
    pub const RECONNECTS_TOTAL: &str = "tubevault_reconnects_total";
    pub const API_ERRORS_TOTAL: &str = "tubevault_api_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::EVENTS_TOTAL, "Activity events received, by type");
    metrics::describe_gauge!(
        names::CHANNEL_CONNECTED,
        "1 while the activity channel is connected"
    );
    metrics::describe_counter!(
        names::CHANNEL_TRANSITIONS_TOTAL,
        "Activity channel state transitions, by target state"
    );
    metrics::describe_counter!(names::RECONNECTS_TOTAL, "Activity channel reconnect attempts");
    metrics::describe_counter!(names::API_ERRORS_TOTAL, "Failed API requests, by kind");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record an activity event.
pub fn record_event(kind: &str) {
    counter!(names::EVENTS_TOTAL, "type" => kind.to_string()).increment(1);
}

/// Record a channel state transition.
pub fn record_state(state: ChannelState) {
    counter!(names::CHANNEL_TRANSITIONS_TOTAL, "state" => state.as_str()).increment(1);
    let connected = if state == ChannelState::Connected { 1.0 } else { 0.0 };
    gauge!(names::CHANNEL_CONNECTED).set(connected);
}

/// Publish the channel's reconnect count.
pub fn set_reconnects(count: u64) {
    counter!(names::RECONNECTS_TOTAL).absolute(count);
}

/// Record a failed API request.
pub fn record_api_error(kind: &str) {
    counter!(names::API_ERRORS_TOTAL, "kind" => kind.to_string()).increment(1);
}
