//! WebSocket gateway: connection state, heartbeat, upgrade and session loop.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod session;
