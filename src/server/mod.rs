//! HTTP surface.
//!
//! - `GET  /health`
//! - `POST /api/{customer,student}/persona`: one-shot persona
//! - `POST /api/{customer,student}/persona/stream?format=json|html`: SSE relay
//! - `POST /api/student/analysis`: structured student analysis
//!
//! Profile bodies may be JSON or urlencoded forms. Validation failures are
//! answered with 422 before any stream starts.

use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::generation::GenerationClient;
use crate::relay::DEFAULT_POLL_INTERVAL;
use crate::telemetry::Telemetry;

mod handlers;

/// Outbound frame buffer per stream. The relay waits when it is full.
pub const FRAME_BUFFER: usize = 64;

/// Shared, read-only state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Generation client over the process-wide provider.
    pub client: GenerationClient,
    /// Trace recorder.
    pub telemetry: Telemetry,
    /// Relay poll interval.
    pub poll_interval: Duration,
}

impl AppState {
    /// State with telemetry disabled and the default poll interval.
    pub fn new(client: GenerationClient) -> Self {
        Self {
            client,
            telemetry: Telemetry::disabled(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Replace the trace recorder.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Replace the relay poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/customer/persona", post(handlers::customer_persona))
        .route(
            "/api/customer/persona/stream",
            post(handlers::customer_persona_stream),
        )
        .route("/api/student/persona", post(handlers::student_persona))
        .route(
            "/api/student/persona/stream",
            post(handlers::student_persona_stream),
        )
        .route("/api/student/analysis", post(handlers::student_analysis))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.server.bind_addr` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(config: &AppConfig, client: GenerationClient) -> Result<()> {
    let state = AppState::new(client)
        .with_telemetry(Telemetry::from_config(&config.telemetry))
        .with_poll_interval(config.server.poll_interval());
    let model = state.client.model_id().to_owned();
    let telemetry = state.telemetry.is_enabled();

    let listener = TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    info!(
        addr = %listener.local_addr()?,
        model = %model,
        telemetry,
        "persona relay listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("persona relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, draining connections");
}
