//! HTTP server assembly and lifecycle

use std::time::Duration;

use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::core::{Config, ServerState, tasks};

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Member-facing loyalty API
        .merge(api::members::router())
        .merge(api::rewards::router())
        .merge(api::redemptions::router())
        // Staff-facing reporting
        .merge(api::transactions::router())
        // Health API - public route
        .merge(api::health::router())
}

/// Build the fully configured application with middleware and state
pub fn build_app(state: &ServerState) -> Router {
    build_router()
        // CORS - scanning UIs are served from merchant domains
        .layer(CorsLayer::permissive())
        // Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone())
}

/// The HTTP server plus its background tasks.
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    /// Run until ctrl-c. Starts the expiry sweep alongside the listener.
    pub async fn run(self) -> anyhow::Result<()> {
        let shutdown = CancellationToken::new();
        let sweep = tasks::spawn_expiry_sweep(
            self.state.redemptions.clone(),
            Duration::from_secs(self.config.expiry_sweep_interval_secs),
            shutdown.clone(),
        );

        let app = build_app(&self.state);
        let listener =
            tokio::net::TcpListener::bind(("0.0.0.0", self.config.http_port)).await?;
        tracing::info!(
            port = self.config.http_port,
            environment = %self.config.environment,
            "gob server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                tokio::signal::ctrl_c().await.ok();
            })
            .await?;

        shutdown.cancel();
        sweep.await.ok();
        Ok(())
    }
}
