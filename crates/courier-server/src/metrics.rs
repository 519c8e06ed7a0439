//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Outbound frames dropped on full client queues (counter).
pub const WS_SEND_DROPS_TOTAL: &str = "ws_send_drops_total";
/// Slow clients evicted past the drop budget (counter).
pub const WS_EVICTIONS_TOTAL: &str = "ws_evictions_total";
/// Users currently online (gauge).
pub const PRESENCE_ONLINE_USERS: &str = "presence_online_users";
/// Inbound client events total (counter, labels: event).
pub const EVENTS_TOTAL: &str = "events_total";
/// Inbound event handler errors total (counter, labels: event, error_type).
pub const EVENT_ERRORS_TOTAL: &str = "event_errors_total";
/// Event handling duration seconds (histogram, labels: event).
pub const EVENT_DURATION_SECONDS: &str = "event_duration_seconds";
/// Chat messages persisted total (counter).
pub const MESSAGES_SENT_TOTAL: &str = "messages_sent_total";
