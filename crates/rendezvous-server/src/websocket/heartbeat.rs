//! Liveness monitoring for a single connection.
//!
//! The session's writer sends the Ping frames; this loop only watches for
//! inbound activity and decides when a client has gone silent.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// Nothing was received from the client for longer than the timeout.
    TimedOut,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Watch `connection` until it goes silent for `timeout` or `cancel` fires.
///
/// Checks run every `interval`. A check that finds fresh activity resets the
/// window; otherwise the time since the last inbound frame is compared with
/// `timeout`.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut check = time::interval(interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    let _ = check.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
            _ = check.tick() => {
                if !connection.check_alive() && connection.last_seen_elapsed() >= timeout {
                    return HeartbeatResult::TimedOut;
                }
            }
        }
    }
}
