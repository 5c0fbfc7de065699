//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why the server settings could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The settings file is not JSON, or a value has the wrong type.
    #[error("{} is not valid settings JSON: {source}", path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying parse failure.
        source: serde_json::Error,
    },
    /// Converting between the settings struct and its JSON form failed.
    #[error("settings conversion failed: {0}")]
    Convert(#[from] serde_json::Error),
    /// A field holds a value the server cannot run with.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted field path, e.g. `server.port`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
