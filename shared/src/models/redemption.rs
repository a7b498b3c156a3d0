//! RedemptionRequest Model — the central state-machine entity

use serde::{Deserialize, Serialize};

use super::{MemberBalance, Tier};

/// Redemption lifecycle states.
///
/// `PENDING → {CONFIRMED, DECLINED, CANCELLED, EXPIRED}`; all non-pending
/// states are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RedemptionStatus {
    Pending,
    Confirmed,
    Declined,
    Cancelled,
    Expired,
}

/// A time-boxed, tokenized intent to redeem a specific reward.
///
/// Mutated only by the verify/confirm/decline/cancel/expire transitions;
/// never written by the ledger — it is a coordination object, not a balance
/// holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct RedemptionRequest {
    pub id: i64,
    pub member_id: i64,
    pub merchant_id: i64,
    pub reward_id: i64,
    /// Optional location override
    pub business_id: Option<i64>,
    /// Opaque token encoded into the QR payload; unique
    pub qr_code_hash: String,
    pub status: RedemptionStatus,
    /// Snapshot shown to staff on verification
    pub member_note: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub confirmed_at: Option<i64>,
    pub declined_at: Option<i64>,
    pub decline_reason: Option<String>,
}

// ========== Wire DTOs ==========

/// Response to a member's create-redemption call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRedemptionResponse {
    pub redemption_id: i64,
    /// Full QR payload: `"gob:redeem:" + qr_code_hash`
    pub qr_code_data: String,
    pub qr_code_hash: String,
    pub expires_at: i64,
    /// True when an existing pending request for the same reward was returned
    /// instead of creating a new one
    pub reused: bool,
}

/// Staff-facing verification view (read-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRedemptionResponse {
    pub redemption_id: i64,
    pub member_id: i64,
    pub member_email: Option<String>,
    pub reward_id: i64,
    pub reward_name: String,
    pub points_cost: i64,
    pub member_points: i64,
    pub member_tier: Tier,
    pub member_note: Option<String>,
    /// Seconds until the request expires
    pub expires_in_secs: i64,
}

/// Result of a successful confirm
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRedemptionResponse {
    pub redemption_id: i64,
    pub reward_name: String,
    pub points_deducted: i64,
    pub new_balance: MemberBalance,
    /// Present for USDC_PAYOUT rewards; a FAILED payout does not undo the
    /// points debit and requires operator attention
    pub payout: Option<super::PayoutOutcome>,
}

/// Member status-poll view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionStatusResponse {
    pub redemption_id: i64,
    pub status: RedemptionStatus,
    pub expires_at: i64,
}
