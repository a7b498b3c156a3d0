//! Reward Repository
//!
//! The core only reads the catalog; CRUD beyond `create` lives in the
//! merchant console (external to this service layer).

use shared::models::{Reward, RewardCreate, RewardType};
use sqlx::{SqliteConnection, SqliteExecutor};

use super::{RepoError, RepoResult};

const REWARD_SELECT: &str = "SELECT id, merchant_id, name, description, points_cost, reward_type, usdc_amount, is_active, sort_order, created_at, updated_at FROM reward";

pub async fn find_by_id(db: impl SqliteExecutor<'_>, id: i64) -> RepoResult<Option<Reward>> {
    let sql = format!("{REWARD_SELECT} WHERE id = ?");
    let row = sqlx::query_as::<_, Reward>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Active rewards in catalog display order (sort_order, then cost, then id).
/// The catalog gate applies the plan limit on top of this ordering.
pub async fn find_active_by_merchant(
    db: impl SqliteExecutor<'_>,
    merchant_id: i64,
) -> RepoResult<Vec<Reward>> {
    let sql = format!(
        "{REWARD_SELECT} WHERE merchant_id = ? AND is_active = 1 ORDER BY sort_order ASC, points_cost ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, Reward>(&sql)
        .bind(merchant_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn create(
    conn: &mut SqliteConnection,
    merchant_id: i64,
    data: RewardCreate,
) -> RepoResult<Reward> {
    if data.points_cost <= 0 {
        return Err(RepoError::Validation("points_cost must be positive".into()));
    }
    if data.reward_type == RewardType::UsdcPayout && data.usdc_amount.is_none() {
        return Err(RepoError::Validation(
            "USDC payout rewards need a usdc_amount".into(),
        ));
    }
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO reward (id, merchant_id, name, description, points_cost, reward_type, usdc_amount, is_active, sort_order, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?9)",
    )
    .bind(id)
    .bind(merchant_id)
    .bind(&data.name)
    .bind(&data.description)
    .bind(data.points_cost)
    .bind(data.reward_type)
    .bind(data.usdc_amount)
    .bind(data.sort_order)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    find_by_id(&mut *conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create reward".into()))
}

/// Soft-deactivate (keeps history intact).
pub async fn deactivate(db: impl SqliteExecutor<'_>, id: i64) -> RepoResult<bool> {
    let now = shared::util::now_millis();
    let rows = sqlx::query(
        "UPDATE reward SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1",
    )
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}
