//! `GET /ws` upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use rendezvous_core::ConnectionId;
use tracing::{debug, warn};

use super::session::run_ws_session;
use crate::metrics::WS_UPGRADES_REJECTED_TOTAL;
use crate::server::AppState;

/// Accept a WebSocket upgrade unless the server is full or shutting down.
///
/// A connection slot is reserved before the upgrade completes and held for
/// the lifetime of the session, so the limit holds under concurrent upgrades.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.shutdown.is_shutting_down() {
        counter!(WS_UPGRADES_REJECTED_TOTAL, "reason" => "shutdown").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }
    let Ok(permit) = state.slots.clone().try_acquire_owned() else {
        warn!(
            max_connections = state.config.max_connections,
            "connection limit reached, refusing upgrade"
        );
        counter!(WS_UPGRADES_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    let id = ConnectionId::new();
    debug!(conn_id = %id, "upgrading connection");
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| async move {
            let _permit = permit;
            let _ = run_ws_session(
                socket,
                id,
                state.hub.clone(),
                state.config.clone(),
                state.shutdown.token(),
            )
            .await;
        })
}
