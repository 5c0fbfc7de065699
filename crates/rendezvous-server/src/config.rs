//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use rendezvous_settings::ServerSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for [`RendezvousServer`](crate::server::RendezvousServer).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Per-connection outbound queue depth.
    pub outbound_queue: usize,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Close a client after this many seconds without any inbound frame.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Directory served for non-API paths.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 1024,
            outbound_queue: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Time between server pings.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Silence after which a client is dropped.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs.max(1))
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl From<&ServerSettings> for ServerConfig {
    fn from(s: &ServerSettings) -> Self {
        Self {
            host: s.host.clone(),
            port: s.port,
            max_connections: s.max_connections,
            outbound_queue: s.outbound_queue,
            heartbeat_interval_secs: s.heartbeat_interval_secs,
            heartbeat_timeout_secs: s.heartbeat_timeout_secs,
            max_message_size: s.max_message_size,
            static_dir: s
                .static_dir
                .as_deref()
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_loopback_ephemeral() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.bind_addr(), "127.0.0.1:0");
        assert!(cfg.static_dir.is_none());
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let cfg = ServerConfig {
            host: "::1".into(),
            port: 8080,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.bind_addr(), "[::1]:8080");
    }

    #[test]
    fn durations_never_zero() {
        let cfg = ServerConfig {
            heartbeat_interval_secs: 0,
            heartbeat_timeout_secs: 0,
            ..ServerConfig::default()
        };
        assert_eq!(cfg.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn from_settings_copies_every_field() {
        let settings = ServerSettings {
            host: "0.0.0.0".into(),
            port: 9000,
            max_connections: 5,
            outbound_queue: 7,
            heartbeat_interval_secs: 10,
            heartbeat_timeout_secs: 25,
            max_message_size: 2048,
            static_dir: Some("/srv/www".into()),
        };
        let cfg = ServerConfig::from(&settings);
        assert_eq!(cfg.bind_addr(), "0.0.0.0:9000");
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.outbound_queue, 7);
        assert_eq!(cfg.heartbeat_timeout(), Duration::from_secs(25));
        assert_eq!(cfg.max_message_size, 2048);
        assert_eq!(cfg.static_dir, Some(PathBuf::from("/srv/www")));
    }

    #[test]
    fn default_settings_serve_the_browser_client() {
        let cfg = ServerConfig::from(&ServerSettings::default());
        assert_eq!(cfg.static_dir, Some(PathBuf::from("static")));
    }

    #[test]
    fn empty_static_dir_disables_static_files() {
        let settings = ServerSettings {
            static_dir: Some("  ".into()),
            ..ServerSettings::default()
        };
        assert!(ServerConfig::from(&settings).static_dir.is_none());
    }
}
