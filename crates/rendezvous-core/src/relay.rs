//! Exclude-sender relay of signaling messages.
//!
//! Relaying is split in two so the hub can hold its lock only while reading
//! shared state: [`plan`] resolves the sender's room and the recipients'
//! delivery handles, and [`deliver`] pushes the messages after the lock is
//! released. A failing recipient never affects the others.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::directory::RoomDirectory;
use crate::errors::{Result, SignalingError};
use crate::ids::{ConnectionId, RoomName};
use crate::protocol::ServerMessage;
use crate::registry::ConnectionRegistry;
use crate::sink::{DeliveryError, PeerSink};

/// One message addressed to one connection.
pub struct Delivery {
    /// Recipient connection.
    pub recipient: ConnectionId,
    /// Recipient's delivery handle, captured under the lock.
    pub sink: Arc<dyn PeerSink>,
    /// What to send.
    pub message: ServerMessage,
}

impl Delivery {
    /// Address `message` to `recipient` if it is still registered.
    pub fn to(
        registry: &ConnectionRegistry,
        recipient: &ConnectionId,
        message: ServerMessage,
    ) -> Option<Self> {
        let Some(sink) = registry.sink(recipient) else {
            error!(conn_id = %recipient, "recipient missing from registry");
            return None;
        };
        Some(Self {
            recipient: recipient.clone(),
            sink,
            message,
        })
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("recipient", &self.recipient)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Deliveries of `message` to every member of the sender's room but the
/// sender itself.
///
/// Fails with [`SignalingError::NotInRoom`] when the sender has no room and
/// with [`SignalingError::UnknownConnection`] when it is not registered.
pub fn plan(
    registry: &ConnectionRegistry,
    directory: &RoomDirectory,
    sender: &ConnectionId,
    message: &ServerMessage,
) -> Result<(RoomName, Vec<Delivery>)> {
    let room = registry.get_room(sender)?.ok_or(SignalingError::NotInRoom)?;
    let deliveries = room_deliveries(registry, directory, &room, sender, message);
    Ok((room, deliveries))
}

/// Deliveries of `message` to every member of `room` except `exclude`.
pub fn room_deliveries(
    registry: &ConnectionRegistry,
    directory: &RoomDirectory,
    room: &RoomName,
    exclude: &ConnectionId,
    message: &ServerMessage,
) -> Vec<Delivery> {
    directory
        .other_members(room, exclude)
        .iter()
        .filter_map(|peer| Delivery::to(registry, peer, message.clone()))
        .collect()
}

/// Push each delivery to its sink.
///
/// Returns the recipients whose outbound queue was full; the caller evicts
/// them. Closed recipients are skipped because their own session is already
/// tearing down.
pub fn deliver(deliveries: Vec<Delivery>) -> Vec<ConnectionId> {
    let mut backlogged = Vec::new();
    for delivery in deliveries {
        match delivery.sink.deliver(&delivery.message) {
            Ok(()) => {
                debug!(
                    conn_id = %delivery.recipient,
                    event_type = delivery.message.event_type(),
                    "delivered"
                );
            }
            Err(DeliveryError::Closed) => {
                debug!(
                    conn_id = %delivery.recipient,
                    event_type = delivery.message.event_type(),
                    "recipient already closed, dropping message"
                );
            }
            Err(DeliveryError::Backlogged) => {
                warn!(
                    conn_id = %delivery.recipient,
                    event_type = delivery.message.event_type(),
                    "recipient queue full"
                );
                if !backlogged.contains(&delivery.recipient) {
                    backlogged.push(delivery.recipient);
                }
            }
        }
    }
    backlogged
}
