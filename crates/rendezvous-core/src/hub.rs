//! Session lifecycle controller.
//!
//! [`SignalingHub`] is the single entry point for connect, join, relay, bye
//! and disconnect events. The connection registry and the room directory live
//! together behind one mutex, so a join (capacity check, admit, record room)
//! and a leave (remove member, clear room, unregister) are each observed as
//! one step by every other connection.
//!
//! Messages are never sent while the lock is held: each operation collects
//! [`Delivery`] values under the lock and flushes them afterwards. A recipient
//! whose outbound queue is full is evicted, which is the same cleanup as a
//! disconnect plus closing its transport.

use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::directory::{JoinOutcome, ROOM_CAPACITY, RoomDirectory};
use crate::errors::{Result, SignalingError};
use crate::ids::{ConnectionId, RoomName};
use crate::protocol::{ClientMessage, ServerMessage, SignalKind};
use crate::registry::ConnectionRegistry;
use crate::relay::{self, Delivery};
use crate::sink::PeerSink;

/// Registry and directory, always mutated together.
#[derive(Default)]
pub struct SignalingState {
    /// Live connections and their rooms.
    pub registry: ConnectionRegistry,
    /// Room memberships.
    pub directory: RoomDirectory,
}

impl SignalingState {
    /// Remove `id` from `room`, clear its room, and address `bye(room)` to
    /// whoever is left.
    fn leave(&mut self, id: &ConnectionId, room: &RoomName) -> Vec<Delivery> {
        let _ = self.directory.leave(room, id);
        let _ = self.registry.clear_room(id);
        relay::room_deliveries(
            &self.registry,
            &self.directory,
            room,
            id,
            &ServerMessage::bye(room),
        )
    }

    /// Leave any room and unregister. `None` if `id` was not registered.
    fn teardown(&mut self, id: &ConnectionId) -> Option<Teardown> {
        let sink = self.registry.sink(id)?;
        let room = self.registry.get_room(id).ok().flatten();
        let deliveries = room
            .as_ref()
            .map(|r| self.leave(id, r))
            .unwrap_or_default();
        let _ = self.registry.unregister(id);
        Some(Teardown {
            room,
            deliveries,
            sink,
        })
    }

    /// Verify the capacity and registry/directory agreement invariants.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        if self.registry.is_empty() && self.directory.room_count() > 0 {
            return Err(format!(
                "{} rooms outlive every connection",
                self.directory.room_count()
            ));
        }
        for (room, members) in self.directory.iter() {
            if members.is_empty() || members.len() > ROOM_CAPACITY {
                return Err(format!("room {room} has {} members", members.len()));
            }
            for member in members {
                match self.registry.get_room(member) {
                    Ok(Some(r)) if &r == room => {}
                    other => {
                        return Err(format!(
                            "member {member} of {room} has registry room {other:?}"
                        ));
                    }
                }
            }
        }
        for (id, room) in self.registry.iter() {
            if let Some(room) = room {
                if !self.directory.members(room).contains(id) {
                    return Err(format!("{id} claims room {room} but is not a member"));
                }
            }
        }
        Ok(())
    }
}

struct Teardown {
    room: Option<RoomName>,
    deliveries: Vec<Delivery>,
    sink: Arc<dyn PeerSink>,
}

/// Shared, lifecycle-scoped signaling state plus the operations on it.
#[derive(Default)]
pub struct SignalingHub {
    state: Mutex<SignalingState>,
}

impl SignalingHub {
    /// Create a hub with no connections and no rooms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and greet it with its ID.
    pub fn connect(&self, id: ConnectionId, sink: Arc<dyn PeerSink>) -> Result<()> {
        let greeting = {
            let mut state = self.state.lock();
            state.registry.register(id.clone(), sink)?;
            record_gauges(&state);
            Delivery::to(
                &state.registry,
                &id,
                ServerMessage::Connected {
                    client_id: id.clone(),
                },
            )
        };
        debug!(conn_id = %id, "connection registered");
        self.flush(greeting.into_iter().collect());
        Ok(())
    }

    /// Join `room`, creating it if nobody is in it.
    ///
    /// A connection already in another room leaves it first (its old peer
    /// gets `bye`), unless the target room is full, in which case nothing
    /// changes. Joining the room the connection is already in is rejected.
    pub fn join(&self, id: &ConnectionId, room: &str) -> Result<JoinOutcome> {
        let room = RoomName::parse(room)?;
        let (outcome, deliveries) = {
            let mut state = self.state.lock();
            let previous = state.registry.get_room(id)?;
            if previous.as_ref() == Some(&room) {
                return Err(SignalingError::AlreadyInRoom(room));
            }

            let outcome = state.directory.try_join(&room, id);
            let mut deliveries = Vec::new();
            if outcome != JoinOutcome::Full {
                if let Some(previous) = previous {
                    deliveries.extend(state.leave(id, &previous));
                }
                state.registry.set_room(id, room.clone())?;
            }

            let reply = match outcome {
                JoinOutcome::Created => ServerMessage::Created(room.clone()),
                JoinOutcome::Joined => ServerMessage::Joined(room.clone()),
                JoinOutcome::Full => ServerMessage::Full(room.clone()),
            };
            deliveries.extend(Delivery::to(&state.registry, id, reply));
            if outcome == JoinOutcome::Joined {
                deliveries.extend(relay::room_deliveries(
                    &state.registry,
                    &state.directory,
                    &room,
                    id,
                    &ServerMessage::NewPeer(room.clone()),
                ));
            }
            gauge!("signaling_rooms").set(usize_to_f64(state.directory.room_count()));
            (outcome, deliveries)
        };

        match outcome {
            JoinOutcome::Created => info!(conn_id = %id, room = %room, "created room"),
            JoinOutcome::Joined => info!(conn_id = %id, room = %room, "joined existing room"),
            JoinOutcome::Full => info!(conn_id = %id, room = %room, "refused join to full room"),
        }
        counter!("signaling_joins_total", "outcome" => outcome.as_str()).increment(1);
        self.flush(deliveries);
        Ok(outcome)
    }

    /// Forward an opaque payload to the other member of the sender's room.
    ///
    /// Returns the number of recipients.
    pub fn relay(&self, id: &ConnectionId, kind: SignalKind, payload: Value) -> Result<usize> {
        let message = ServerMessage::signal(kind, payload);
        let (room, deliveries) = {
            let state = self.state.lock();
            relay::plan(&state.registry, &state.directory, id, &message)?
        };
        let recipients = deliveries.len();
        debug!(conn_id = %id, room = %room, kind = %kind, recipients, "relaying signal");
        counter!("signaling_relayed_total", "kind" => kind.as_str()).increment(1);
        self.flush(deliveries);
        Ok(recipients)
    }

    /// Leave the current room and notify the other member.
    ///
    /// The registry's room is authoritative; a differing `room` argument is
    /// logged and otherwise ignored.
    pub fn bye(&self, id: &ConnectionId, room: &str) -> Result<RoomName> {
        let (current, deliveries) = {
            let mut state = self.state.lock();
            let current = state
                .registry
                .get_room(id)?
                .ok_or(SignalingError::NotInRoom)?;
            let deliveries = state.leave(id, &current);
            gauge!("signaling_rooms").set(usize_to_f64(state.directory.room_count()));
            (current, deliveries)
        };
        if current.as_str() != room {
            warn!(conn_id = %id, requested = room, room = %current, "bye names another room, leaving current room");
        }
        info!(conn_id = %id, room = %current, "left room");
        counter!("signaling_relayed_total", "kind" => SignalKind::Bye.as_str()).increment(1);
        self.flush(deliveries);
        Ok(current)
    }

    /// Remove a connection entirely, leaving its room first.
    ///
    /// Safe to call more than once and for IDs that were evicted already.
    /// Returns the room the connection was in.
    pub fn disconnect(&self, id: &ConnectionId) -> Option<RoomName> {
        let teardown = {
            let mut state = self.state.lock();
            let teardown = state.teardown(id);
            record_gauges(&state);
            teardown
        };
        let Some(Teardown {
            room, deliveries, ..
        }) = teardown
        else {
            debug!(conn_id = %id, "disconnect for unregistered connection");
            return None;
        };
        if let Some(room) = &room {
            info!(conn_id = %id, room = %room, "connection left room on disconnect");
        }
        self.flush(deliveries);
        room
    }

    /// Dispatch a decoded client event. Client errors are reported to the
    /// sender only; invariant violations are logged and dropped.
    pub fn handle(&self, id: &ConnectionId, message: ClientMessage) {
        let result = match message {
            ClientMessage::Join(room) => self.join(id, &room).map(drop),
            ClientMessage::Invite(payload) => self.relay(id, SignalKind::Invite, payload).map(drop),
            ClientMessage::Answer(payload) => self.relay(id, SignalKind::Answer, payload).map(drop),
            ClientMessage::IceCandidate(payload) => {
                self.relay(id, SignalKind::IceCandidate, payload).map(drop)
            }
            ClientMessage::Bye(room) => self.bye(id, &room).map(drop),
        };
        if let Err(err) = result {
            self.report(id, &err);
        }
    }

    /// Decode one text frame and dispatch it.
    pub fn handle_text(&self, id: &ConnectionId, text: &str) {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle(id, message),
            Err(err) => self.report(id, &err),
        }
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.state.lock().directory.room_count()
    }

    /// Members currently in `room`.
    pub fn room_size(&self, room: &RoomName) -> usize {
        self.state.lock().directory.member_count(room)
    }

    /// Room of a registered connection.
    pub fn room_of(&self, id: &ConnectionId) -> Option<RoomName> {
        self.state.lock().registry.get_room(id).ok().flatten()
    }

    /// Verify the capacity and consistency invariants on a snapshot.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        self.state.lock().check_invariants()
    }

    /// Report a failed event. Client errors go back to the sender as an
    /// `error` event; anything else is an internal inconsistency and is only
    /// logged.
    pub fn report(&self, id: &ConnectionId, err: &SignalingError) {
        if !err.is_client_error() {
            let departed = matches!(err, SignalingError::UnknownConnection(gone) if gone == id)
                && !self.state.lock().registry.contains(id);
            if departed {
                // Frames still in flight after an eviction or disconnect.
                debug!(conn_id = %id, error = %err, "event from departed connection, dropping");
            } else {
                error!(conn_id = %id, error = %err, "registry/directory inconsistency, dropping event");
            }
            return;
        }
        warn!(conn_id = %id, code = err.code(), error = %err, "rejected client event");
        let delivery = {
            let state = self.state.lock();
            if !state.registry.contains(id) {
                return;
            }
            Delivery::to(&state.registry, id, ServerMessage::error(err))
        };
        self.flush(delivery.into_iter().collect());
    }

    /// Deliver outside the lock, evicting backlogged recipients until no
    /// delivery is left.
    fn flush(&self, deliveries: Vec<Delivery>) {
        let mut pending = deliveries;
        while !pending.is_empty() {
            for id in relay::deliver(std::mem::take(&mut pending)) {
                pending.extend(self.evict(&id));
            }
        }
    }

    fn evict(&self, id: &ConnectionId) -> Vec<Delivery> {
        let teardown = {
            let mut state = self.state.lock();
            let teardown = state.teardown(id);
            record_gauges(&state);
            teardown
        };
        let Some(Teardown {
            room,
            deliveries,
            sink,
        }) = teardown
        else {
            return Vec::new();
        };
        warn!(conn_id = %id, room = ?room.as_ref().map(RoomName::as_str), "evicting connection with full outbound queue");
        counter!("signaling_evictions_total").increment(1);
        sink.close();
        deliveries
    }
}

fn record_gauges(state: &SignalingState) {
    gauge!("signaling_connections").set(usize_to_f64(state.registry.len()));
    gauge!("signaling_rooms").set(usize_to_f64(state.directory.room_count()));
}

#[allow(clippy::cast_precision_loss)]
fn usize_to_f64(n: usize) -> f64 {
    n as f64
}
