//! Prometheus metrics recorder and metric names.

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// WebSocket disconnections total (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// WebSocket session lifetime (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Upgrades refused because of the connection limit or shutdown (counter).
pub const WS_UPGRADES_REJECTED_TOTAL: &str = "ws_upgrades_rejected_total";
/// Join attempts (counter, labels: outcome). Recorded by the hub.
pub const SIGNALING_JOINS_TOTAL: &str = "signaling_joins_total";
/// Relayed signaling events (counter, labels: kind). Recorded by the hub.
pub const SIGNALING_RELAYED_TOTAL: &str = "signaling_relayed_total";
/// Peers evicted for a full outbound queue (counter). Recorded by the hub.
pub const SIGNALING_EVICTIONS_TOTAL: &str = "signaling_evictions_total";
/// Registered connections (gauge). Recorded by the hub.
pub const SIGNALING_CONNECTIONS: &str = "signaling_connections";
/// Non-empty rooms (gauge). Recorded by the hub.
pub const SIGNALING_ROOMS: &str = "signaling_rooms";

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Returns the handle used to render `/metrics`. Fails if a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

fn describe() {
    describe_counter!(WS_CONNECTIONS_TOTAL, "WebSocket connections accepted");
    describe_gauge!(WS_CONNECTIONS_ACTIVE, "WebSocket connections currently open");
    describe_counter!(WS_DISCONNECTIONS_TOTAL, "WebSocket sessions ended, by reason");
    describe_histogram!(
        WS_CONNECTION_DURATION_SECONDS,
        Unit::Seconds,
        "WebSocket session lifetime"
    );
    describe_counter!(WS_UPGRADES_REJECTED_TOTAL, "WebSocket upgrades refused");
    describe_counter!(SIGNALING_JOINS_TOTAL, "Room join attempts, by outcome");
    describe_counter!(SIGNALING_RELAYED_TOTAL, "Signaling events relayed, by kind");
    describe_counter!(SIGNALING_EVICTIONS_TOTAL, "Peers evicted for a full outbound queue");
    describe_gauge!(SIGNALING_CONNECTIONS, "Connections registered with the hub");
    describe_gauge!(SIGNALING_ROOMS, "Rooms with at least one member");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_recorder_renders() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(WS_CONNECTIONS_TOTAL).increment(3);
        });
        let output = handle.render();
        assert!(output.contains("ws_connections_total 3"), "{output}");
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTION_DURATION_SECONDS,
            WS_UPGRADES_REJECTED_TOTAL,
            SIGNALING_JOINS_TOTAL,
            SIGNALING_RELAYED_TOTAL,
            SIGNALING_EVICTIONS_TOTAL,
            SIGNALING_CONNECTIONS,
            SIGNALING_ROOMS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
