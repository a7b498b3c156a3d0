//! Member API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::api::auth::CurrentMember;
use crate::core::ServerState;
use crate::utils::AppResult;
use shared::models::MemberBalance;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceQuery {
    pub merchant_id: i64,
}

/// GET /api/members/balance?merchantId=... - the member's points and tier at
/// one merchant (creates the ledger row lazily on first touch)
pub async fn balance(
    State(state): State<ServerState>,
    member: CurrentMember,
    Query(query): Query<BalanceQuery>,
) -> AppResult<Json<MemberBalance>> {
    let balance = state.ledger.balance(query.merchant_id, member.member_id).await?;
    Ok(Json(balance))
}
