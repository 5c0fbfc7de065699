//! # rendezvous-core
//!
//! Transport-agnostic core of the two-party signaling server.
//!
//! - [`registry::ConnectionRegistry`]: live connections and the room each belongs to
//! - [`directory::RoomDirectory`]: room membership with a hard capacity of two
//! - [`relay`]: exclude-sender fan-out of signaling payloads
//! - [`hub::SignalingHub`]: the session lifecycle controller that keeps the
//!   registry and directory consistent under one lock
//! - [`protocol`]: the JSON event envelope spoken over the wire

#![deny(unsafe_code)]

pub mod directory;
pub mod errors;
pub mod hub;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod sink;

pub use errors::{Result, SignalingError};
pub use hub::SignalingHub;
pub use ids::{ConnectionId, RoomName};
pub use protocol::{ClientMessage, ServerMessage, SignalKind};
pub use sink::{DeliveryError, PeerSink};
