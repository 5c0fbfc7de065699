//! `RendezvousServer`: Axum HTTP + WebSocket server around a [`SignalingHub`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use rendezvous_core::SignalingHub;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Signaling state shared by every session.
    pub hub: Arc<SignalingHub>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// One permit per allowed concurrent connection.
    pub slots: Arc<Semaphore>,
    /// When the server started (monotonic).
    pub start_time: Instant,
    /// When the server started (wall clock).
    pub started_at: DateTime<Utc>,
    /// Prometheus handle, if a recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The rendezvous signaling server.
pub struct RendezvousServer {
    config: Arc<ServerConfig>,
    hub: Arc<SignalingHub>,
    shutdown: Arc<ShutdownCoordinator>,
    slots: Arc<Semaphore>,
    start_time: Instant,
    started_at: DateTime<Utc>,
    metrics: Option<PrometheusHandle>,
}

impl RendezvousServer {
    /// Create a server with an empty hub.
    pub fn new(config: ServerConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_connections.min(Semaphore::MAX_PERMITS)));
        Self {
            config: Arc::new(config),
            hub: Arc::new(SignalingHub::new()),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            slots,
            start_time: Instant::now(),
            started_at: Utc::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from this Prometheus handle.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.clone(),
            slots: self.slots.clone(),
            start_time: self.start_time,
            started_at: self.started_at,
            metrics: self.metrics.clone(),
        };

        let mut router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler));
        if let Some(dir) = &self.config.static_dir {
            router = router.fallback_service(ServeDir::new(dir));
        }
        router
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address (useful with port `0`) and the server task,
    /// which finishes after [`ShutdownCoordinator::shutdown`].
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let bind_err = |source| ServerError::Bind {
            addr: addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        if let Some(dir) = &self.config.static_dir {
            if dir.is_dir() {
                info!(dir = %dir.display(), "serving browser client");
            } else {
                warn!(dir = %dir.display(), "static directory not found, GET / will return 404");
            }
        }

        let router = self.router();
        let token = self.shutdown.token();
        info!(%local_addr, "rendezvous server listening");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(err) = result {
                error!(error = %err, "server terminated with error");
            }
            info!("server stopped");
        });
        Ok((local_addr, handle))
    }

    /// Get the signaling hub.
    pub fn hub(&self) -> &Arc<SignalingHub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.started_at,
        state.hub.connection_count(),
        state.hub.room_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
