//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rendezvous_core::{ConnectionId, DeliveryError, PeerSink, ServerMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// A connected WebSocket client, as seen by the signaling hub.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether any frame arrived since the last heartbeat check.
    pub is_alive: AtomicBool,
    /// When the last frame of any kind was received.
    last_seen: Mutex<Instant>,
    /// Count of messages refused because the queue was full.
    pub dropped_messages: AtomicU64,
    /// Cancelled when the connection must be torn down.
    closing: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            closing: CancellationToken::new(),
        }
    }

    /// Enqueue a serialized message without waiting.
    pub fn send(&self, message: Arc<String>) -> Result<(), DeliveryError> {
        if self.closing.is_cancelled() {
            return Err(DeliveryError::Closed);
        }
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(DeliveryError::Backlogged)
            }
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Total messages refused for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record inbound activity.
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Time since the last inbound frame (or connection establishment).
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Check and reset the alive flag.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Token cancelled once [`PeerSink::close`] has been called.
    pub fn closing(&self) -> &CancellationToken {
        &self.closing
    }

    /// Whether teardown was requested.
    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl PeerSink for ClientConnection {
    fn deliver(&self, message: &ServerMessage) -> Result<(), DeliveryError> {
        match message.to_json() {
            Ok(json) => self.send(Arc::new(json)),
            Err(err) => {
                error!(conn_id = %self.id, error = %err, "failed to serialize outbound message");
                Ok(())
            }
        }
    }

    fn close(&self) {
        self.closing.cancel();
    }
}
