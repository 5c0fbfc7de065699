//! `/health` endpoint.

use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Start time, RFC 3339.
    pub started_at: String,
    /// Connections registered with the hub.
    pub connections: usize,
    /// Rooms with at least one member.
    pub rooms: usize,
}

/// Build a health response from live counters.
pub fn health_check(
    start_time: Instant,
    started_at: DateTime<Utc>,
    connections: usize,
    rooms: usize,
) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        started_at: started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        connections,
        rooms,
    }
}
