//! Settings types with compiled defaults.

use rendezvous_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Browser client directory, relative to the working directory.
pub const DEFAULT_STATIC_DIR: &str = "static";

/// Root settings object, mirroring `~/.rendezvous/settings.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendezvousSettings {
    /// Listener and per-connection limits.
    pub server: ServerSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// Server network and runtime settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port. `0` picks an ephemeral port.
    pub port: u16,
    /// Maximum concurrent WebSocket connections.
    pub max_connections: usize,
    /// Outbound messages buffered per connection before it is evicted.
    pub outbound_queue: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence after which a client is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
    /// Directory served at `/`. `null` in the settings file keeps the
    /// default; an explicit empty string disables static files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 1024,
            outbound_queue: 64,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 60,
            max_message_size: 64 * 1024,
            static_dir: Some(DEFAULT_STATIC_DIR.to_string()),
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// `compact` or `json`.
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl RendezvousSettings {
    /// Reject combinations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.server;
        if s.host.trim().is_empty() {
            return Err(SettingsError::invalid("server.host", "must not be empty"));
        }
        if s.max_connections == 0 {
            return Err(SettingsError::invalid(
                "server.max_connections",
                "must be at least 1",
            ));
        }
        if s.outbound_queue == 0 {
            return Err(SettingsError::invalid(
                "server.outbound_queue",
                "must be at least 1",
            ));
        }
        if s.heartbeat_interval_secs == 0 {
            return Err(SettingsError::invalid(
                "server.heartbeat_interval_secs",
                "must be at least 1",
            ));
        }
        if s.heartbeat_timeout_secs <= s.heartbeat_interval_secs {
            return Err(SettingsError::invalid(
                "server.heartbeat_timeout_secs",
                format!(
                    "{} must exceed heartbeat_interval_secs ({})",
                    s.heartbeat_timeout_secs, s.heartbeat_interval_secs
                ),
            ));
        }
        if s.max_message_size < 1024 {
            return Err(SettingsError::invalid(
                "server.max_message_size",
                "must be at least 1024",
            ));
        }
        if let Err(err) = self.logging.format.parse::<LogFormat>() {
            return Err(SettingsError::invalid("logging.format", err.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = RendezvousSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.logging.format, "compact");
        assert_eq!(settings.server.static_dir.as_deref(), Some(DEFAULT_STATIC_DIR));
    }

    #[test]
    fn serializes_snake_case_sections() {
        let json = serde_json::to_value(RendezvousSettings::default()).unwrap();
        assert_eq!(json["server"]["max_connections"], 1024);
        assert_eq!(json["logging"]["level"], "info");
        assert_eq!(json["server"]["static_dir"], "static");
    }

    #[test]
    fn zero_queue_is_rejected() {
        let mut settings = RendezvousSettings::default();
        settings.server.outbound_queue = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Invalid {
                field: "server.outbound_queue",
                ..
            })
        ));
    }

    #[test]
    fn timeout_must_exceed_interval() {
        let mut settings = RendezvousSettings::default();
        settings.server.heartbeat_timeout_secs = settings.server.heartbeat_interval_secs;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat_timeout_secs"));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut settings = RendezvousSettings::default();
        settings.logging.format = "xml".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn subscriber_format_aliases_are_valid() {
        let mut settings = RendezvousSettings::default();
        for alias in ["pretty", "text", "JSON"] {
            settings.logging.format = alias.into();
            settings.validate().unwrap();
        }
    }

    #[test]
    fn ephemeral_port_is_allowed() {
        let mut settings = RendezvousSettings::default();
        settings.server.port = 0;
        settings.validate().unwrap();
    }
}
