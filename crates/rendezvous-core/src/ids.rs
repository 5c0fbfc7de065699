//! Newtype identifiers for connections and rooms.
//!
//! Connection IDs are assigned by the server when a transport session opens.
//! Room names come from clients and are only checked for emptiness and length;
//! the server never generates them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SignalingError;

/// Longest accepted room name, in bytes.
pub const MAX_ROOM_NAME_LEN: usize = 256;

macro_rules! string_newtype {
    ($name:ident) => {
        impl $name {
            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

/// Opaque identifier of one live transport session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

string_newtype!(ConnectionId);

impl ConnectionId {
    /// Generate a fresh time-ordered ID (`conn_<uuid v7>`).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Client-chosen name of a two-party room.
///
/// Deserialization goes through [`RoomName::parse`], so a name that made it
/// off the wire is never empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomName(String);

string_newtype!(RoomName);

impl RoomName {
    /// Validate a client-supplied room name.
    pub fn parse(name: impl Into<String>) -> Result<Self, SignalingError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SignalingError::InvalidRoom {
                reason: "room name must not be empty".into(),
            });
        }
        if name.len() > MAX_ROOM_NAME_LEN {
            return Err(SignalingError::InvalidRoom {
                reason: format!("room name exceeds {MAX_ROOM_NAME_LEN} bytes"),
            });
        }
        Ok(Self(name))
    }
}

impl TryFrom<String> for RoomName {
    type Error = SignalingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for RoomName {
    type Error = SignalingError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomName> for String {
    fn from(room: RoomName) -> Self {
        room.0
    }
}
