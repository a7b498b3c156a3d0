//! RewardTransaction Repository — append-only transaction recorder
//!
//! Rows are written once for every balance-affecting or payout event and
//! never deleted. The single permitted mutation is flipping a PAYOUT row from
//! PENDING to SUCCESS/FAILED once settlement resolves; the flip is guarded so
//! duplicate settlement callbacks are no-ops.

use shared::models::{NewTransaction, RewardTransaction, TransactionKind, TransactionStatus};
use sqlx::{SqliteConnection, SqliteExecutor};

use super::{RepoError, RepoResult};

const TX_SELECT: &str = "SELECT id, merchant_member_id, member_id, merchant_id, business_id, kind, amount, usdc_amount, points_deducted, reason, status, tx_hash, error_message, created_at FROM reward_transaction";

pub async fn find_by_id(
    db: impl SqliteExecutor<'_>,
    id: i64,
) -> RepoResult<Option<RewardTransaction>> {
    let sql = format!("{TX_SELECT} WHERE id = ?");
    let row = sqlx::query_as::<_, RewardTransaction>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn insert(
    conn: &mut SqliteConnection,
    data: NewTransaction,
) -> RepoResult<RewardTransaction> {
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO reward_transaction (id, merchant_member_id, member_id, merchant_id, business_id, kind, amount, usdc_amount, points_deducted, reason, status, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )
    .bind(id)
    .bind(data.merchant_member_id)
    .bind(data.member_id)
    .bind(data.merchant_id)
    .bind(data.business_id)
    .bind(data.kind)
    .bind(data.amount)
    .bind(data.usdc_amount)
    .bind(data.points_deducted)
    .bind(&data.reason)
    .bind(data.status)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    find_by_id(&mut *conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to record transaction".into()))
}

/// Settle a PENDING payout row. Guarded on status so a duplicate settlement
/// callback affects zero rows and reports false.
pub async fn settle_payout(
    db: impl SqliteExecutor<'_>,
    id: i64,
    status: TransactionStatus,
    tx_hash: Option<&str>,
    error_message: Option<&str>,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE reward_transaction SET status = ?1, tx_hash = ?2, error_message = ?3 WHERE id = ?4 AND status = 'PENDING' AND kind = 'PAYOUT'",
    )
    .bind(status)
    .bind(tx_hash)
    .bind(error_message)
    .bind(id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

pub async fn list_by_merchant_member(
    db: impl SqliteExecutor<'_>,
    merchant_member_id: i64,
    limit: i64,
) -> RepoResult<Vec<RewardTransaction>> {
    let sql = format!(
        "{TX_SELECT} WHERE merchant_member_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
    );
    let rows = sqlx::query_as::<_, RewardTransaction>(&sql)
        .bind(merchant_member_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn list_by_merchant(
    db: impl SqliteExecutor<'_>,
    merchant_id: i64,
    limit: i64,
) -> RepoResult<Vec<RewardTransaction>> {
    let sql = format!("{TX_SELECT} WHERE merchant_id = ? ORDER BY created_at DESC, id DESC LIMIT ?");
    let rows = sqlx::query_as::<_, RewardTransaction>(&sql)
        .bind(merchant_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Filtered listing for reporting (e.g. the merchant's payout history).
pub async fn list_by_merchant_and_kind(
    db: impl SqliteExecutor<'_>,
    merchant_id: i64,
    kind: TransactionKind,
    limit: i64,
) -> RepoResult<Vec<RewardTransaction>> {
    let sql = format!(
        "{TX_SELECT} WHERE merchant_id = ? AND kind = ? ORDER BY created_at DESC, id DESC LIMIT ?"
    );
    let rows = sqlx::query_as::<_, RewardTransaction>(&sql)
        .bind(merchant_id)
        .bind(kind)
        .bind(limit)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Total USD attempted or settled for payouts in the current budget window.
/// FAILED rows do not count against the budget; PENDING rows do (in-flight
/// transfers reserve their amount).
pub async fn payout_total_since(
    db: impl SqliteExecutor<'_>,
    merchant_id: i64,
    window_start: i64,
) -> RepoResult<f64> {
    let sum: Option<f64> = sqlx::query_scalar(
        "SELECT SUM(usdc_amount) FROM reward_transaction WHERE merchant_id = ? AND kind = 'PAYOUT' AND status != 'FAILED' AND created_at >= ?",
    )
    .bind(merchant_id)
    .bind(window_start)
    .fetch_one(db)
    .await?;
    Ok(sum.unwrap_or(0.0))
}
