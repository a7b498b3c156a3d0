//! Health check routes
//!
//! | Path | Method | Description | Auth |
//! |------|--------|-------------|------|
//! | /health | GET | Simple liveness check | none |

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::core::ServerState;

/// Health routes - public (no authentication)
pub fn router() -> Router<ServerState> {
    Router::new().route("/health", get(health))
}

#[derive(Serialize)]
pub struct HealthResponse {
    /// Status (ok | error)
    status: &'static str,
    /// Version
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
