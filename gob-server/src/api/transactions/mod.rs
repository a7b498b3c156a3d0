//! Transaction history API module

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route(
        "/api/merchants/{merchant_id}/transactions",
        get(handler::list),
    )
}
