//! Redemption API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::api::auth::{CurrentMember, CurrentStaff};
use crate::core::ServerState;
use crate::loyalty::redemption::QR_PREFIX;
use crate::utils::{AppError, AppResult};
use shared::models::{
    ConfirmRedemptionResponse, CreateRedemptionResponse, RedemptionStatusResponse,
    VerifyRedemptionResponse,
};

#[derive(Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRedemptionPayload {
    pub merchant_id: i64,
    pub reward_id: i64,
    pub business_id: Option<i64>,
    #[validate(length(max = 500))]
    pub member_note: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayload {
    pub business_id: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeclinePayload {
    pub reason: Option<String>,
}

/// POST /api/redemptions - member creates a redemption request and receives
/// the QR payload
pub async fn create(
    State(state): State<ServerState>,
    member: CurrentMember,
    Json(payload): Json<CreateRedemptionPayload>,
) -> AppResult<Json<CreateRedemptionResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let response = state
        .redemptions
        .create(
            member.member_id,
            payload.merchant_id,
            payload.reward_id,
            payload.business_id,
            payload.member_note,
        )
        .await?;
    Ok(Json(response))
}

/// GET /api/redemptions/verify/:token - staff verification (read-only).
/// Accepts the bare token; a full QR payload with the transport prefix is
/// tolerated.
pub async fn verify(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Path(token): Path<String>,
) -> AppResult<Json<VerifyRedemptionResponse>> {
    let token = token.strip_prefix(QR_PREFIX).unwrap_or(&token);
    let response = state.redemptions.verify(token, staff.merchant_id).await?;
    Ok(Json(response))
}

/// POST /api/redemptions/:id/confirm - staff confirms; debits the ledger and
/// (for USDC rewards) reports the payout outcome. Body may be `{}`.
pub async fn confirm(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Path(id): Path<i64>,
    Json(payload): Json<ConfirmPayload>,
) -> AppResult<Json<ConfirmRedemptionResponse>> {
    let response = state
        .redemptions
        .confirm(id, staff.merchant_id, payload.business_id)
        .await?;
    tracing::info!(
        redemption_id = id,
        merchant_id = staff.merchant_id,
        staff_id = staff.staff_id,
        "Redemption confirmed by staff"
    );
    Ok(Json(response))
}

/// POST /api/redemptions/:id/decline - staff declines; no ledger effect.
/// Body may be `{}`.
pub async fn decline(
    State(state): State<ServerState>,
    staff: CurrentStaff,
    Path(id): Path<i64>,
    Json(payload): Json<DeclinePayload>,
) -> AppResult<Json<()>> {
    state
        .redemptions
        .decline(id, staff.merchant_id, payload.reason)
        .await?;
    Ok(Json(()))
}

/// POST /api/redemptions/:id/cancel - owning member cancels a pending request
pub async fn cancel(
    State(state): State<ServerState>,
    member: CurrentMember,
    Path(id): Path<i64>,
) -> AppResult<Json<()>> {
    state.redemptions.cancel(id, member.member_id).await?;
    Ok(Json(()))
}

/// GET /api/redemptions/:id - member polls the request status
pub async fn status(
    State(state): State<ServerState>,
    member: CurrentMember,
    Path(id): Path<i64>,
) -> AppResult<Json<RedemptionStatusResponse>> {
    let response = state.redemptions.status(id, member.member_id).await?;
    Ok(Json(response))
}
