//! WebSocket session lifecycle: one connected client from upgrade through
//! disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use rendezvous_core::{ConnectionId, PeerSink, SignalingError, SignalingHub};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// How long the writer may take to flush and close after the session ends.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame or dropped the socket.
    ClientClosed,
    /// Reading from the socket failed, including oversized frames.
    TransportError,
    /// No inbound frame within the heartbeat timeout.
    TimedOut,
    /// The hub closed the connection because its queue was full.
    Evicted,
    /// The server is shutting down.
    Shutdown,
}

impl DisconnectReason {
    /// Lowercase label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::TimedOut => "timed_out",
            Self::Evicted => "evicted",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with the hub, which greets it with `connected`
/// 2. Dispatches inbound text (and UTF-8 binary) frames to the hub
/// 3. Forwards queued outbound events and sends periodic Ping frames
/// 4. Ends on close, transport error, heartbeat timeout, eviction or shutdown
/// 5. Disconnects from the hub, which notifies the remaining peer
#[instrument(skip_all, fields(conn_id = %id))]
pub async fn run_ws_session(
    ws: WebSocket,
    id: ConnectionId,
    hub: Arc<SignalingHub>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) -> DisconnectReason {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.outbound_queue.max(1));
    let connection = Arc::new(ClientConnection::new(id.clone(), send_tx));

    if let Err(err) = hub.connect(id.clone(), connection.clone()) {
        warn!(error = %err, "refusing connection");
        let _ = ws_tx.send(Message::Close(None)).await;
        return DisconnectReason::TransportError;
    }

    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    // Outbound forwarder with periodic Ping frames.
    let ping_every = config.heartbeat_interval();
    let writer_conn = connection.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_every);
        let _ = ping.tick().await;
        loop {
            tokio::select! {
                msg = send_rx.recv() => {
                    let Some(text) = msg else { break };
                    if ws_tx.send(Message::Text(Arc::unwrap_or_clone(text).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                () = writer_conn.closing().cancelled() => break,
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        let _ = ws_tx.close().await;
    });

    let heartbeat = run_heartbeat(
        connection.clone(),
        config.heartbeat_interval(),
        config.heartbeat_timeout(),
        connection.closing().clone(),
    );
    tokio::pin!(heartbeat);

    let reason = loop {
        tokio::select! {
            frame = ws_rx.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(err)) => {
                        debug!(error = %err, "websocket read failed");
                        break DisconnectReason::TransportError;
                    }
                    None => break DisconnectReason::ClientClosed,
                };
                connection.mark_alive();
                match msg {
                    Message::Text(text) => hub.handle_text(&id, text.as_str()),
                    Message::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => hub.handle_text(&id, text),
                        Err(_) => {
                            info!(len = data.len(), "received non-UTF8 binary frame");
                            hub.report(&id, &SignalingError::InvalidMessage {
                                reason: "binary frame is not valid UTF-8".into(),
                            });
                        }
                    },
                    Message::Close(_) => {
                        info!("client sent close frame");
                        break DisconnectReason::ClientClosed;
                    }
                    Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            result = &mut heartbeat => {
                break match result {
                    HeartbeatResult::TimedOut => {
                        warn!(silent_for = ?connection.last_seen_elapsed(), "client unresponsive, disconnecting");
                        DisconnectReason::TimedOut
                    }
                    HeartbeatResult::Cancelled => DisconnectReason::Evicted,
                };
            }
            () = shutdown.cancelled() => break DisconnectReason::Shutdown,
        }
    };

    // Release hub state before the client can observe the close.
    let room = hub.disconnect(&id);
    connection.close();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        writer.abort();
    }

    info!(
        reason = reason.as_str(),
        room = room.as_deref(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
    reason
}
