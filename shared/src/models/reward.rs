//! Reward Model

use serde::{Deserialize, Serialize};

/// How a reward is fulfilled on confirmation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RewardType {
    /// Fulfilled in person by staff (free item, discount, ...)
    Traditional,
    /// Fulfilled as an on-chain USDC transfer
    UsdcPayout,
}

/// Catalog reward, belongs to one merchant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Reward {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub points_cost: i64,
    pub reward_type: RewardType,
    /// Required iff reward_type is USDC_PAYOUT
    pub usdc_amount: Option<f64>,
    pub is_active: bool,
    pub sort_order: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create reward payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardCreate {
    pub name: String,
    pub description: Option<String>,
    pub points_cost: i64,
    pub reward_type: RewardType,
    pub usdc_amount: Option<f64>,
    pub sort_order: i64,
}

/// Catalog display view: the reward plus its computed greying flag.
///
/// Greying is never persisted — it is recomputed from the merchant's plan on
/// every read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardView {
    #[serde(flatten)]
    pub reward: Reward,
    /// False when the reward is beyond the plan's catalog limit
    pub redeemable: bool,
}
