//! Redemption API module
//!
//! Member routes create/cancel/poll a request; staff routes verify the QR
//! token and confirm or decline. The split is by extractor (member vs staff
//! session), not by path prefix, mirroring who holds the device.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/redemptions", routes())
}

fn routes() -> Router<ServerState> {
    // Member routes
    let member_routes = Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::status))
        .route("/{id}/cancel", post(handler::cancel));

    // Staff routes
    let staff_routes = Router::new()
        .route("/verify/{token}", get(handler::verify))
        .route("/{id}/confirm", post(handler::confirm))
        .route("/{id}/decline", post(handler::decline));

    member_routes.merge(staff_routes)
}
