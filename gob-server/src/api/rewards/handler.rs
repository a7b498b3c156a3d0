//! Reward catalog handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use crate::db::repository::{merchant, reward};
use crate::loyalty::catalog;
use crate::utils::{AppError, AppResult};
use shared::models::RewardView;

/// GET /api/merchants/:id/rewards - the merchant's catalog with greying
/// computed from the current plan (never persisted)
pub async fn list(
    State(state): State<ServerState>,
    Path(merchant_id): Path<i64>,
) -> AppResult<Json<Vec<RewardView>>> {
    let merchant = merchant::find_by_id(&state.pool, merchant_id)
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("Merchant {merchant_id}")))?;

    let rewards = reward::find_active_by_merchant(&state.pool, merchant_id)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

    Ok(Json(catalog::catalog_view(&merchant.plan, rewards)))
}
