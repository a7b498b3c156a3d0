//! Merchant Repository

use shared::models::{Merchant, MerchantCreate};
use sqlx::{SqliteConnection, SqliteExecutor};

use super::{RepoError, RepoResult};

const MERCHANT_SELECT: &str = "SELECT id, slug, name, plan, vip_threshold, super_threshold, payout_enabled, payout_milestone_points, payout_amount_usd, payout_monthly_budget_usd, payout_budget_reset_day, created_at, updated_at FROM merchant";

pub async fn find_by_id(db: impl SqliteExecutor<'_>, id: i64) -> RepoResult<Option<Merchant>> {
    let sql = format!("{MERCHANT_SELECT} WHERE id = ?");
    let row = sqlx::query_as::<_, Merchant>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn find_by_slug(
    db: impl SqliteExecutor<'_>,
    slug: &str,
) -> RepoResult<Option<Merchant>> {
    let sql = format!("{MERCHANT_SELECT} WHERE slug = ?");
    let row = sqlx::query_as::<_, Merchant>(&sql)
        .bind(slug)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn create(conn: &mut SqliteConnection, data: MerchantCreate) -> RepoResult<Merchant> {
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT INTO merchant (id, slug, name, plan, vip_threshold, super_threshold, payout_enabled, payout_milestone_points, payout_amount_usd, payout_monthly_budget_usd, payout_budget_reset_day, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
    )
    .bind(id)
    .bind(&data.slug)
    .bind(&data.name)
    .bind(&data.plan)
    .bind(data.vip_threshold)
    .bind(data.super_threshold)
    .bind(data.payout_enabled)
    .bind(data.payout_milestone_points)
    .bind(data.payout_amount_usd)
    .bind(data.payout_monthly_budget_usd)
    .bind(data.payout_budget_reset_day)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    find_by_id(&mut *conn, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create merchant".into()))
}

/// Update thresholds and payout settings (merchant console).
pub async fn update_payout_settings(
    db: impl SqliteExecutor<'_>,
    id: i64,
    enabled: bool,
    monthly_budget_usd: Option<f64>,
    reset_day: i64,
) -> RepoResult<bool> {
    let now = shared::util::now_millis();
    let rows = sqlx::query(
        "UPDATE merchant SET payout_enabled = ?1, payout_monthly_budget_usd = ?2, payout_budget_reset_day = ?3, updated_at = ?4 WHERE id = ?5",
    )
    .bind(enabled)
    .bind(monthly_budget_usd)
    .bind(reset_day)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}
