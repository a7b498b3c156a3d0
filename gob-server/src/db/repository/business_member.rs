//! BusinessMember Repository — location-scoped analytics projection
//!
//! Populated from the same earn path that appends the transaction row, so
//! there is exactly one logical write per scan. Points are never stored here;
//! the authoritative balance lives on merchant_member only.

use shared::models::BusinessMember;
use sqlx::{SqliteConnection, SqliteExecutor};

use super::RepoResult;

pub async fn find(
    db: impl SqliteExecutor<'_>,
    business_id: i64,
    member_id: i64,
) -> RepoResult<Option<BusinessMember>> {
    let row = sqlx::query_as::<_, BusinessMember>(
        "SELECT id, business_id, merchant_id, member_id, visit_count, last_scan_at, created_at, updated_at FROM business_member WHERE business_id = ? AND member_id = ?",
    )
    .bind(business_id)
    .bind(member_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Record a visit at a physical location: lazily creates the row, then bumps
/// the counter.
pub async fn record_visit(
    conn: &mut SqliteConnection,
    business_id: i64,
    merchant_id: i64,
    member_id: i64,
    now: i64,
) -> RepoResult<()> {
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT OR IGNORE INTO business_member (id, business_id, merchant_id, member_id, visit_count, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
    )
    .bind(id)
    .bind(business_id)
    .bind(merchant_id)
    .bind(member_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        "UPDATE business_member SET visit_count = visit_count + 1, last_scan_at = ?1, updated_at = ?1 WHERE business_id = ?2 AND member_id = ?3",
    )
    .bind(now)
    .bind(business_id)
    .bind(member_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
