//! BusinessMember Model — location-scoped analytics projection
//!
//! Legacy per-location record kept for visit tracking. NOT authoritative for
//! points: the points balance lives only on `MerchantMember`, and this row is
//! populated from the same transaction stream as a derived projection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct BusinessMember {
    pub id: i64,
    pub business_id: i64,
    pub merchant_id: i64,
    pub member_id: i64,
    pub visit_count: i64,
    pub last_scan_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}
