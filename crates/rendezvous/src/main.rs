//! # rendezvous
//!
//! Signaling server binary: loads settings, initializes logging and metrics,
//! then serves HTTP/WebSocket until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rendezvous_core::logging::{self, LogFormat};
use rendezvous_server::shutdown::{DEFAULT_SHUTDOWN_TIMEOUT, shutdown_signal};
use rendezvous_server::{RendezvousServer, ServerConfig};
use rendezvous_settings::RendezvousSettings;

/// Two-party WebRTC signaling server.
#[derive(Parser, Debug)]
#[command(name = "rendezvous", version, about = "Two-party WebRTC signaling server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file. Defaults to `~/.rendezvous/settings.json`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with the browser client, served at `/` (default `static`).
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Log filter, e.g. `info` or `rendezvous_core=debug`. `RUST_LOG` wins.
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format: `compact` or `json`.
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    /// Flags take priority over every settings layer.
    fn apply(&self, settings: &mut RendezvousSettings) {
        let server = &mut settings.server;
        if let Some(host) = &self.host {
            server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(max) = self.max_connections {
            server.max_connections = max;
        }
        if let Some(dir) = &self.static_dir {
            server.static_dir = Some(dir.to_string_lossy().into_owned());
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            settings.logging.format = format.as_str().to_string();
        }
    }

    fn settings(&self) -> Result<RendezvousSettings> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(rendezvous_settings::settings_path);
        let mut settings = rendezvous_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.settings()?;

    let format: LogFormat = settings
        .logging
        .format
        .parse()
        .context("Invalid log format")?;
    logging::init_subscriber(&settings.logging.level, format);

    let handle = rendezvous_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let config = ServerConfig::from(&settings.server);
    let server = RendezvousServer::new(config).with_metrics(handle);
    let (addr, task) = server.listen().await.context("Failed to bind server")?;

    tracing::info!(
        max_connections = settings.server.max_connections,
        "rendezvous listening on http://{addr} (ws://{addr}/ws)"
    );

    shutdown_signal().await;

    tracing::info!(
        connections = server.hub().connection_count(),
        "Shutting down..."
    );
    if !server.shutdown().drain(task, DEFAULT_SHUTDOWN_TIMEOUT).await {
        tracing::warn!("server did not drain in time");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
