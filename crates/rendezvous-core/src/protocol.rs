//! Wire protocol: JSON events of the form `{"type": "...", "data": ...}`.
//!
//! Signaling payloads (`invite`, `ok`, `ice_candidate`) are carried as raw
//! [`serde_json::Value`]s and are never inspected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SignalingError;
use crate::ids::{ConnectionId, RoomName};

/// Kind of a relayed signaling message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// SDP offer.
    Invite,
    /// SDP answer (`ok` on the wire).
    Answer,
    /// ICE connectivity candidate.
    IceCandidate,
    /// Termination notice.
    Bye,
}

impl SignalKind {
    /// Event name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Invite => "invite",
            Self::Answer => "ok",
            Self::IceCandidate => "ice_candidate",
            Self::Bye => "bye",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events a client may send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (or create) the named room. Validated by the hub.
    Join(String),
    /// SDP offer for the other room member.
    Invite(Value),
    /// SDP answer for the other room member.
    #[serde(rename = "ok")]
    Answer(Value),
    /// ICE candidate for the other room member.
    IceCandidate(Value),
    /// Leave the room and notify the other member.
    Bye(String),
}

impl ClientMessage {
    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        serde_json::from_str(text).map_err(|e| SignalingError::InvalidMessage {
            reason: e.to_string(),
        })
    }

    /// Event name, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::Invite(_) => "invite",
            Self::Answer(_) => "ok",
            Self::IceCandidate(_) => "ice_candidate",
            Self::Bye(_) => "bye",
        }
    }
}

/// Error payload sent to the offending client only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. `NOT_IN_ROOM`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

/// Events the server sends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent right after the upgrade.
    Connected {
        /// Server-assigned connection ID.
        #[serde(rename = "clientId")]
        client_id: ConnectionId,
    },
    /// The sender created the room and is its only member.
    Created(RoomName),
    /// The sender joined a room that had one member.
    Joined(RoomName),
    /// The room already has two members; nothing changed.
    Full(RoomName),
    /// A second member joined the sender's room.
    NewPeer(RoomName),
    /// Relayed SDP offer.
    Invite(Value),
    /// Relayed SDP answer.
    #[serde(rename = "ok")]
    Answer(Value),
    /// Relayed ICE candidate.
    IceCandidate(Value),
    /// The other member left (explicitly or by disconnecting).
    Bye(Value),
    /// A request from this client was rejected.
    Error(ErrorBody),
}

impl ServerMessage {
    /// Build the pass-through message for a relayed payload.
    pub fn signal(kind: SignalKind, payload: Value) -> Self {
        match kind {
            SignalKind::Invite => Self::Invite(payload),
            SignalKind::Answer => Self::Answer(payload),
            SignalKind::IceCandidate => Self::IceCandidate(payload),
            SignalKind::Bye => Self::Bye(payload),
        }
    }

    /// `bye` notice carrying the room name.
    pub fn bye(room: &RoomName) -> Self {
        Self::Bye(Value::String(room.as_str().to_owned()))
    }

    /// Error event for a rejected client request.
    pub fn error(err: &SignalingError) -> Self {
        Self::Error(err.to_error_body())
    }

    /// Event name, for logging and metrics.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Created(_) => "created",
            Self::Joined(_) => "joined",
            Self::Full(_) => "full",
            Self::NewPeer(_) => "new_peer",
            Self::Invite(_) => "invite",
            Self::Answer(_) => "ok",
            Self::IceCandidate(_) => "ice_candidate",
            Self::Bye(_) => "bye",
            Self::Error(_) => "error",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
