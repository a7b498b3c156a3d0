//! Member Model

use serde::{Deserialize, Serialize};

/// Member entity — a natural person, globally unique by verified email or
/// wallet address. A member may belong to many merchants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Member {
    pub id: i64,
    /// Optional when the account is wallet-only
    pub email: Option<String>,
    pub wallet_address: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create member payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberCreate {
    pub email: Option<String>,
    pub wallet_address: Option<String>,
}
