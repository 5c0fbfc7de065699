//! # rendezvous-server
//!
//! Axum HTTP + `WebSocket` gateway in front of the signaling hub.
//!
//! - `GET /ws`: `WebSocket` upgrade, one session task per client
//! - `GET /health`, `GET /metrics`: JSON health and Prometheus text
//! - optional static directory for the browser client
//! - graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::RendezvousServer;
