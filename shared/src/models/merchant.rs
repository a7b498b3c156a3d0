//! Merchant Model

use serde::{Deserialize, Serialize};

/// Subscription plan — controls reward-catalog limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Plan {
    Starter,
    Growth,
    Pro,
}

/// Merchant entity (tenant)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Merchant {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub plan: Plan,
    /// Points at which a member reaches VIP tier
    pub vip_threshold: i64,
    /// Points at which a member reaches SUPER tier
    pub super_threshold: i64,
    // === USDC payout configuration ===
    pub payout_enabled: bool,
    /// Points milestone required before a member is payout-eligible
    pub payout_milestone_points: i64,
    /// USD amount transferred per payout
    pub payout_amount_usd: f64,
    /// Monthly budget cap in USD; no cap when absent
    pub payout_monthly_budget_usd: Option<f64>,
    /// Day of month (1-28) the budget window resets
    pub payout_budget_reset_day: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create merchant payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantCreate {
    pub slug: String,
    pub name: String,
    pub plan: Plan,
    pub vip_threshold: i64,
    pub super_threshold: i64,
    pub payout_enabled: bool,
    pub payout_milestone_points: i64,
    pub payout_amount_usd: f64,
    pub payout_monthly_budget_usd: Option<f64>,
    pub payout_budget_reset_day: i64,
}
