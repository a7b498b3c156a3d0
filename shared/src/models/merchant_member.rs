//! MerchantMember Model — the authoritative points ledger row

use serde::{Deserialize, Serialize};

/// Points-threshold-derived status level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum Tier {
    Base,
    Vip,
    Super,
}

/// The aggregate relationship between one Member and one Merchant.
///
/// Exactly one row per (merchant_id, member_id) pair — the single source of
/// truth for "how many points does this member have at this merchant",
/// aggregated across the merchant's physical locations. Created lazily on
/// first merchant-scoped interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct MerchantMember {
    pub id: i64,
    pub merchant_id: i64,
    pub member_id: i64,
    /// Invariant: never negative
    pub points: i64,
    pub tier: Tier,
    pub last_birthday_claim_year: Option<i64>,
    pub referral_code: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Balance view returned by ledger reads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberBalance {
    pub points: i64,
    pub tier: Tier,
}
