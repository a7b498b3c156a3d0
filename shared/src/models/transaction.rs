//! RewardTransaction Model — append-only ledger entries

use serde::{Deserialize, Serialize};

/// What kind of balance-affecting or payout event a transaction records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TransactionKind {
    Earn,
    Redeem,
    Adjust,
    Payout,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum TransactionStatus {
    Success,
    Failed,
    Pending,
}

/// Immutable transaction record.
///
/// Sign convention for `amount` (points): EARN is positive, REDEEM is the
/// positive cost (subtracted during reconciliation), ADJUST carries its sign
/// (staff credit positive, staff debit negative), PAYOUT is zero (value is in
/// `usdc_amount`). The only permitted mutation is flipping a PAYOUT row from
/// PENDING to SUCCESS/FAILED once settlement resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct RewardTransaction {
    pub id: i64,
    pub merchant_member_id: i64,
    pub member_id: i64,
    pub merchant_id: i64,
    pub business_id: Option<i64>,
    pub kind: TransactionKind,
    /// Points delta (see sign convention above)
    pub amount: i64,
    /// USD value for PAYOUT rows
    pub usdc_amount: Option<f64>,
    /// Points spent by the redemption that triggered a PAYOUT
    pub points_deducted: Option<i64>,
    pub reason: String,
    pub status: TransactionStatus,
    /// On-chain transaction hash once a payout settles
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
    pub created_at: i64,
}

/// Insert payload for the transaction recorder
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub merchant_member_id: i64,
    pub member_id: i64,
    pub merchant_id: i64,
    pub business_id: Option<i64>,
    pub kind: TransactionKind,
    pub amount: i64,
    pub usdc_amount: Option<f64>,
    pub points_deducted: Option<i64>,
    pub reason: String,
    pub status: TransactionStatus,
}

/// Outcome of a payout attempt, nested into the confirm response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutOutcome {
    /// RewardTransaction id of the PAYOUT row (also the idempotency key
    /// handed to the transfer provider)
    pub transaction_id: i64,
    pub usdc_amount: f64,
    pub status: TransactionStatus,
    pub tx_hash: Option<String>,
    pub error_message: Option<String>,
}
