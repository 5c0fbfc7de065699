//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RendezvousSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `RENDEZVOUS_*` environment variable overrides
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use rendezvous_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::RendezvousSettings;

/// Resolve the path to the settings file (`~/.rendezvous/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".rendezvous").join("settings.json")
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid final value
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<RendezvousSettings> {
    let mut settings = read_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults with the file at `path` merged over them, no env overrides.
pub fn read_file_layer(path: &Path) -> Result<RendezvousSettings> {
    let defaults = serde_json::to_value(RendezvousSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    serde_json::from_value(merged).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_env_overrides(settings: &mut RendezvousSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`, so tests need not touch the
/// process environment.
pub fn apply_overrides<F>(settings: &mut RendezvousSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |name: &str| lookup(name).filter(|v| !v.is_empty());
    let ranged = |name: &str, min: usize, max: usize| {
        let val = lookup(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid numeric env var, ignoring");
        }
        result
    };

    if let Some(v) = string("RENDEZVOUS_HOST") {
        settings.server.host = v;
    }
    if let Some(val) = lookup("RENDEZVOUS_PORT") {
        match parse_u16_range(&val, 0, u16::MAX) {
            Some(v) => settings.server.port = v,
            None => tracing::warn!(key = "RENDEZVOUS_PORT", value = %val, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = ranged("RENDEZVOUS_MAX_CONNECTIONS", 1, 1_000_000) {
        settings.server.max_connections = v;
    }
    if let Some(v) = ranged("RENDEZVOUS_OUTBOUND_QUEUE", 1, 65_536) {
        settings.server.outbound_queue = v;
    }
    if let Some(v) = string("RENDEZVOUS_STATIC_DIR") {
        settings.server.static_dir = Some(v);
    }
    if let Some(v) = string("RENDEZVOUS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(val) = string("RENDEZVOUS_LOG_FORMAT") {
        match val.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format.as_str().to_string(),
            Err(err) => tracing::warn!(key = "RENDEZVOUS_LOG_FORMAT", error = %err, "invalid log format env var, ignoring"),
        }
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
