//! RedemptionRequest Repository
//!
//! Every state transition is a guarded UPDATE on `status = 'PENDING'`
//! (compare-and-swap): concurrent confirm/decline/cancel/expire calls race on
//! the row and exactly one wins. rows_affected tells the caller whether it
//! won; classification of a loss is done by re-reading the row.

use shared::models::RedemptionRequest;
use sqlx::{SqliteConnection, SqliteExecutor};

use super::{RepoError, RepoResult};

const REDEMPTION_SELECT: &str = "SELECT id, member_id, merchant_id, reward_id, business_id, qr_code_hash, status, member_note, created_at, expires_at, confirmed_at, declined_at, decline_reason FROM redemption_request";

pub async fn find_by_id(
    db: impl SqliteExecutor<'_>,
    id: i64,
) -> RepoResult<Option<RedemptionRequest>> {
    let sql = format!("{REDEMPTION_SELECT} WHERE id = ?");
    let row = sqlx::query_as::<_, RedemptionRequest>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn find_by_token(
    db: impl SqliteExecutor<'_>,
    qr_code_hash: &str,
) -> RepoResult<Option<RedemptionRequest>> {
    let sql = format!("{REDEMPTION_SELECT} WHERE qr_code_hash = ?");
    let row = sqlx::query_as::<_, RedemptionRequest>(&sql)
        .bind(qr_code_hash)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// The member's live pending request for this reward, if any (expired rows
/// that have not been swept yet do not count).
pub async fn find_pending(
    db: impl SqliteExecutor<'_>,
    member_id: i64,
    merchant_id: i64,
    reward_id: i64,
    now: i64,
) -> RepoResult<Option<RedemptionRequest>> {
    let sql = format!(
        "{REDEMPTION_SELECT} WHERE member_id = ? AND merchant_id = ? AND reward_id = ? AND status = 'PENDING' AND expires_at > ?"
    );
    let row = sqlx::query_as::<_, RedemptionRequest>(&sql)
        .bind(member_id)
        .bind(merchant_id)
        .bind(reward_id)
        .bind(now)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    conn: &mut SqliteConnection,
    member_id: i64,
    merchant_id: i64,
    reward_id: i64,
    business_id: Option<i64>,
    qr_code_hash: &str,
    member_note: Option<&str>,
    created_at: i64,
    expires_at: i64,
) -> RepoResult<RedemptionRequest> {
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO redemption_request (id, member_id, merchant_id, reward_id, business_id, qr_code_hash, status, member_note, created_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'PENDING', ?7, ?8, ?9)",
    )
    .bind(id)
    .bind(member_id)
    .bind(merchant_id)
    .bind(reward_id)
    .bind(business_id)
    .bind(qr_code_hash)
    .bind(member_note)
    .bind(created_at)
    .bind(expires_at)
    .execute(&mut *conn)
    .await?;
    find_by_id(&mut *conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create redemption request".into()))
}

/// Lazy expiry: flip a single overdue PENDING row to EXPIRED.
pub async fn expire_if_stale(
    db: impl SqliteExecutor<'_>,
    id: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE redemption_request SET status = 'EXPIRED' WHERE id = ? AND status = 'PENDING' AND expires_at <= ?",
    )
    .bind(id)
    .bind(now)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Expire an overdue pending row for one (member, merchant, reward) triple,
/// freeing the one-live-pending slot before a new create.
pub async fn expire_stale_for(
    db: impl SqliteExecutor<'_>,
    member_id: i64,
    merchant_id: i64,
    reward_id: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE redemption_request SET status = 'EXPIRED' WHERE member_id = ? AND merchant_id = ? AND reward_id = ? AND status = 'PENDING' AND expires_at <= ?",
    )
    .bind(member_id)
    .bind(merchant_id)
    .bind(reward_id)
    .bind(now)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Background sweep: expire every overdue PENDING row. Idempotent.
pub async fn expire_stale(db: impl SqliteExecutor<'_>, now: i64) -> RepoResult<u64> {
    let rows = sqlx::query(
        "UPDATE redemption_request SET status = 'EXPIRED' WHERE status = 'PENDING' AND expires_at <= ?",
    )
    .bind(now)
    .execute(db)
    .await?;
    Ok(rows.rows_affected())
}

/// CAS PENDING → CONFIRMED. False when the request is no longer pending (or
/// already past its expiry).
pub async fn confirm_pending(
    db: impl SqliteExecutor<'_>,
    id: i64,
    merchant_id: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE redemption_request SET status = 'CONFIRMED', confirmed_at = ?1 WHERE id = ?2 AND merchant_id = ?3 AND status = 'PENDING' AND expires_at > ?1",
    )
    .bind(now)
    .bind(id)
    .bind(merchant_id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// CAS PENDING → DECLINED (staff).
pub async fn decline_pending(
    db: impl SqliteExecutor<'_>,
    id: i64,
    merchant_id: i64,
    reason: Option<&str>,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE redemption_request SET status = 'DECLINED', declined_at = ?1, decline_reason = ?2 WHERE id = ?3 AND merchant_id = ?4 AND status = 'PENDING'",
    )
    .bind(now)
    .bind(reason)
    .bind(id)
    .bind(merchant_id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// CAS PENDING → CANCELLED (owning member).
pub async fn cancel_pending(
    db: impl SqliteExecutor<'_>,
    id: i64,
    member_id: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE redemption_request SET status = 'CANCELLED' WHERE id = ? AND member_id = ? AND status = 'PENDING'",
    )
    .bind(id)
    .bind(member_id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}
