//! Signaling error codes and error type.

use crate::ids::{ConnectionId, RoomName};
use crate::protocol::ErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Incoming frame was not a recognizable client event.
pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
/// Room name failed validation.
pub const INVALID_ROOM: &str = "INVALID_ROOM";
/// Signaling message sent by a connection that is in no room.
pub const NOT_IN_ROOM: &str = "NOT_IN_ROOM";
/// Join for the room the connection already belongs to.
pub const ALREADY_IN_ROOM: &str = "ALREADY_IN_ROOM";
/// Connection ID registered twice.
pub const DUPLICATE_CONNECTION: &str = "DUPLICATE_CONNECTION";
/// Operation referenced a connection the registry does not know.
pub const UNKNOWN_CONNECTION: &str = "UNKNOWN_CONNECTION";

/// Errors raised by the registry, directory and hub.
///
/// A full room is not an error: it is reported as
/// [`JoinOutcome::Full`](crate::directory::JoinOutcome::Full).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignalingError {
    /// `register` was called for an ID that is already tracked.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// The ID is not registered (registry/directory desync or a late event).
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// The sender has not joined a room.
    #[error("connection is not in a room")]
    NotInRoom,

    /// The sender asked to join the room it is already in.
    #[error("already in room {0}")]
    AlreadyInRoom(RoomName),

    /// Room name was empty or too long.
    #[error("invalid room name: {reason}")]
    InvalidRoom {
        /// What is wrong with the name.
        reason: String,
    },

    /// Frame could not be decoded into a client event.
    #[error("invalid message: {reason}")]
    InvalidMessage {
        /// Decoder error text.
        reason: String,
    },
}

impl SignalingError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateConnection(_) => DUPLICATE_CONNECTION,
            Self::UnknownConnection(_) => UNKNOWN_CONNECTION,
            Self::NotInRoom => NOT_IN_ROOM,
            Self::AlreadyInRoom(_) => ALREADY_IN_ROOM,
            Self::InvalidRoom { .. } => INVALID_ROOM,
            Self::InvalidMessage { .. } => INVALID_MESSAGE,
        }
    }

    /// Whether this error was caused by the client (as opposed to a server
    /// invariant violation).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotInRoom
                | Self::AlreadyInRoom(_)
                | Self::InvalidRoom { .. }
                | Self::InvalidMessage { .. }
        )
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}

/// Result type for signaling operations.
pub type Result<T> = std::result::Result<T, SignalingError>;
