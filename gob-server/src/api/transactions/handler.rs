//! Transaction history handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::auth::CurrentStaff;
use crate::core::ServerState;
use crate::db::repository::reward_transaction;
use crate::utils::{AppError, AppResult};
use shared::models::{RewardTransaction, TransactionKind};

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    /// Optional kind filter (e.g. PAYOUT for the payout history report)
    pub kind: Option<TransactionKind>,
}

/// GET /api/merchants/:id/transactions?kind=PAYOUT - recent transaction
/// history for audit and payout reporting (staff of that merchant only)
pub async fn list(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Path(merchant_id): Path<i64>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<RewardTransaction>>> {
    if staff.merchant_id != merchant_id {
        return Err(AppError::Forbidden(
            "transactions belong to another merchant".into(),
        ));
    }
    let limit = query.limit.unwrap_or(100).clamp(1, 500);
    let rows = match query.kind {
        Some(kind) => {
            reward_transaction::list_by_merchant_and_kind(&state.pool, merchant_id, kind, limit)
                .await
        }
        None => reward_transaction::list_by_merchant(&state.pool, merchant_id, limit).await,
    }
    .map_err(|e| AppError::database(e.to_string()))?;
    Ok(Json(rows))
}
