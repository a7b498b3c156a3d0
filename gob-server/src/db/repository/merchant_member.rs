//! MerchantMember Repository — the authoritative points ledger row
//!
//! All balance arithmetic happens in single guarded UPDATE statements so two
//! concurrent debits against the same row can never both pass a stale
//! check-then-write.

use shared::models::{MerchantMember, Tier};
use sqlx::{SqliteConnection, SqliteExecutor};

use super::{RepoError, RepoResult};

const MM_SELECT: &str = "SELECT id, merchant_id, member_id, points, tier, last_birthday_claim_year, referral_code, created_at, updated_at FROM merchant_member";

pub async fn find(
    db: impl SqliteExecutor<'_>,
    merchant_id: i64,
    member_id: i64,
) -> RepoResult<Option<MerchantMember>> {
    let sql = format!("{MM_SELECT} WHERE merchant_id = ? AND member_id = ?");
    let row = sqlx::query_as::<_, MerchantMember>(&sql)
        .bind(merchant_id)
        .bind(member_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn find_by_id(
    db: impl SqliteExecutor<'_>,
    id: i64,
) -> RepoResult<Option<MerchantMember>> {
    let sql = format!("{MM_SELECT} WHERE id = ?");
    let row = sqlx::query_as::<_, MerchantMember>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Lazily create the ledger row on first merchant-scoped touch.
///
/// INSERT OR IGNORE on UNIQUE(merchant_id, member_id): concurrent callers
/// converge on the same row with points = 0, tier = BASE.
pub async fn ensure(
    conn: &mut SqliteConnection,
    merchant_id: i64,
    member_id: i64,
) -> RepoResult<MerchantMember> {
    let now = shared::util::now_millis();
    let id = shared::util::snowflake_id();
    sqlx::query(
        "INSERT OR IGNORE INTO merchant_member (id, merchant_id, member_id, points, tier, created_at, updated_at) VALUES (?1, ?2, ?3, 0, 'BASE', ?4, ?4)",
    )
    .bind(id)
    .bind(merchant_id)
    .bind(member_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    find(&mut *conn, merchant_id, member_id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to ensure merchant member".into()))
}

/// Unconditional credit: `points = points + amount`.
pub async fn add_points(
    db: impl SqliteExecutor<'_>,
    id: i64,
    amount: i64,
    now: i64,
) -> RepoResult<()> {
    sqlx::query("UPDATE merchant_member SET points = points + ?1, updated_at = ?2 WHERE id = ?3")
        .bind(amount)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Guarded debit for redemptions: succeeds only when the balance covers the
/// amount. Returns false (row untouched) otherwise.
pub async fn debit_points_guarded(
    db: impl SqliteExecutor<'_>,
    id: i64,
    amount: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE merchant_member SET points = points - ?1, updated_at = ?2 WHERE id = ?3 AND points >= ?1",
    )
    .bind(amount)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Clamped debit for staff corrections: floors at zero instead of failing.
pub async fn adjust_points_clamped(
    db: impl SqliteExecutor<'_>,
    id: i64,
    amount: i64,
    now: i64,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE merchant_member SET points = MAX(0, points - ?1), updated_at = ?2 WHERE id = ?3",
    )
    .bind(amount)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn set_tier(
    db: impl SqliteExecutor<'_>,
    id: i64,
    tier: Tier,
    now: i64,
) -> RepoResult<()> {
    sqlx::query("UPDATE merchant_member SET tier = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(tier)
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Assign a referral code once; later calls are no-ops.
pub async fn assign_referral_code(
    db: impl SqliteExecutor<'_>,
    id: i64,
    code: &str,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE merchant_member SET referral_code = ?1, updated_at = ?2 WHERE id = ?3 AND referral_code IS NULL",
    )
    .bind(code)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Claim the birthday reward marker for `year`. Returns false when the year
/// was already claimed (at-most-once per calendar year).
pub async fn mark_birthday_claim(
    db: impl SqliteExecutor<'_>,
    id: i64,
    year: i64,
    now: i64,
) -> RepoResult<bool> {
    let rows = sqlx::query(
        "UPDATE merchant_member SET last_birthday_claim_year = ?1, updated_at = ?2 WHERE id = ?3 AND (last_birthday_claim_year IS NULL OR last_birthday_claim_year < ?1)",
    )
    .bind(year)
    .bind(now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// Advisory reconciliation: signed sum of the row's transaction stream.
///
/// EARN and ADJUST carry their own sign, REDEEM subtracts, PAYOUT moves no
/// points. Audit-only — no read path trusts this over `points`.
pub async fn reconcile(db: impl SqliteExecutor<'_>, id: i64) -> RepoResult<i64> {
    let sum: Option<i64> = sqlx::query_scalar(
        "SELECT SUM(CASE kind WHEN 'REDEEM' THEN -amount WHEN 'PAYOUT' THEN 0 ELSE amount END) FROM reward_transaction WHERE merchant_member_id = ?",
    )
    .bind(id)
    .fetch_one(db)
    .await?;
    Ok(sum.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{seed_member, seed_merchant, test_pool};

    #[tokio::test]
    async fn ensure_is_idempotent_and_lazy() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let a = ensure(&mut conn, merchant.id, member.id).await.unwrap();
        assert_eq!(a.points, 0);
        assert_eq!(a.tier, Tier::Base);

        let b = ensure(&mut conn, merchant.id, member.id).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn guarded_debit_rejects_insufficient_balance() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let mm = ensure(&mut conn, merchant.id, member.id).await.unwrap();
        add_points(&mut *conn, mm.id, 50, 1000).await.unwrap();

        assert!(!debit_points_guarded(&mut *conn, mm.id, 51, 2000).await.unwrap());
        assert!(debit_points_guarded(&mut *conn, mm.id, 50, 2000).await.unwrap());

        let after = find_by_id(&mut *conn, mm.id).await.unwrap().unwrap();
        assert_eq!(after.points, 0);
    }

    #[tokio::test]
    async fn clamped_adjust_floors_at_zero() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let mm = ensure(&mut conn, merchant.id, member.id).await.unwrap();
        add_points(&mut *conn, mm.id, 30, 1000).await.unwrap();

        adjust_points_clamped(&mut *conn, mm.id, 100, 2000).await.unwrap();
        let after = find_by_id(&mut *conn, mm.id).await.unwrap().unwrap();
        assert_eq!(after.points, 0);
    }

    #[tokio::test]
    async fn birthday_claim_once_per_year() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let mm = ensure(&mut conn, merchant.id, member.id).await.unwrap();

        assert!(mark_birthday_claim(&mut *conn, mm.id, 2026, 1000).await.unwrap());
        assert!(!mark_birthday_claim(&mut *conn, mm.id, 2026, 2000).await.unwrap());
        // Next year claims again
        assert!(mark_birthday_claim(&mut *conn, mm.id, 2027, 3000).await.unwrap());
    }
}
