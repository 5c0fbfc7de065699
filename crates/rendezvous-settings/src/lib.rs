//! # rendezvous-settings
//!
//! Configuration for the rendezvous server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`RendezvousSettings::default()`]
//! 2. **Settings file**: `~/.rendezvous/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `RENDEZVOUS_*` overrides
//!
//! Command-line flags are applied on top by the binary.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings_from_path, settings_path};
pub use types::{DEFAULT_STATIC_DIR, LoggingSettings, RendezvousSettings, ServerSettings};
