//! Points Ledger
//!
//! The authoritative points balance and tier per (merchant, member). Balances
//! live on a single `merchant_member` row; every mutation re-derives the tier
//! from the merchant's current thresholds and appends a transaction record
//! inside the same database transaction.

use chrono::Datelike;
use sqlx::{SqliteConnection, SqlitePool};

use shared::models::{
    Member, MemberBalance, Merchant, MerchantMember, NewTransaction, Tier, TransactionKind,
    TransactionStatus,
};

use super::{LoyaltyError, LoyaltyResult};
use crate::db::repository::{business_member, member, merchant, merchant_member, reward_transaction};

/// Tier for a points balance against merchant thresholds.
///
/// Thresholds are merchant-configurable, so the tier is re-evaluated on every
/// credit and debit rather than only on upgrades.
pub fn tier_for_points(points: i64, vip_threshold: i64, super_threshold: i64) -> Tier {
    if points >= super_threshold {
        Tier::Super
    } else if points >= vip_threshold {
        Tier::Vip
    } else {
        Tier::Base
    }
}

/// How a credit is recorded in the transaction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditKind {
    /// Points earned by a visit or purchase
    Earn,
    /// Staff-initiated correction
    Adjust,
}

/// How a debit behaves when the balance cannot cover it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitKind {
    /// Reward redemption: rejected outright when insufficient
    Redeem,
    /// Staff-initiated correction: clamps at zero instead of failing
    Adjust,
}

#[derive(Clone)]
pub struct PointsLedger {
    pool: SqlitePool,
}

impl PointsLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current points and tier, creating the ledger row lazily on first
    /// access (not every member interacts with every merchant before first
    /// touch).
    pub async fn balance(&self, merchant_id: i64, member_id: i64) -> LoyaltyResult<MemberBalance> {
        let mut conn = self.pool.acquire().await.map_err(crate::db::repository::RepoError::from)?;
        merchant::find_by_id(&mut *conn, merchant_id)
            .await?
            .ok_or(LoyaltyError::NotFound("merchant"))?;
        let mm = merchant_member::ensure(&mut conn, merchant_id, member_id).await?;
        Ok(MemberBalance {
            points: mm.points,
            tier: mm.tier,
        })
    }

    /// Increase the balance. Crediting has no upper bound and never fails on
    /// business logic. `business_id` additionally records a visit at that
    /// location (analytics projection, never points).
    pub async fn credit(
        &self,
        merchant_id: i64,
        member_id: i64,
        amount: i64,
        kind: CreditKind,
        reason: &str,
        business_id: Option<i64>,
    ) -> LoyaltyResult<MemberBalance> {
        if amount <= 0 {
            return Err(LoyaltyError::Validation(
                "credit amount must be a positive integer".into(),
            ));
        }
        let now = shared::util::now_millis();
        let mut tx = self.pool.begin().await.map_err(crate::db::repository::RepoError::from)?;

        let merchant = merchant::find_by_id(&mut *tx, merchant_id)
            .await?
            .ok_or(LoyaltyError::NotFound("merchant"))?;
        let mm = merchant_member::ensure(&mut tx, merchant_id, member_id).await?;

        merchant_member::add_points(&mut *tx, mm.id, amount, now).await?;
        let balance = refresh_tier(&mut tx, &merchant, mm.id, now).await?;

        let tx_kind = match kind {
            CreditKind::Earn => TransactionKind::Earn,
            CreditKind::Adjust => TransactionKind::Adjust,
        };
        reward_transaction::insert(
            &mut tx,
            NewTransaction {
                merchant_member_id: mm.id,
                member_id,
                merchant_id,
                business_id,
                kind: tx_kind,
                amount,
                usdc_amount: None,
                points_deducted: None,
                reason: reason.to_string(),
                status: TransactionStatus::Success,
            },
        )
        .await?;

        if let (Some(business_id), CreditKind::Earn) = (business_id, kind) {
            business_member::record_visit(&mut tx, business_id, merchant_id, member_id, now)
                .await?;
        }

        tx.commit().await.map_err(crate::db::repository::RepoError::from)?;
        tracing::debug!(merchant_id, member_id, amount, "Points credited");
        Ok(balance)
    }

    /// Decrease the balance.
    ///
    /// REDEEM-kind debits fail with `InsufficientBalance` when the balance
    /// cannot cover the amount; ADJUST-kind debits clamp at zero (staff
    /// corrections deliberately use the softer policy).
    pub async fn debit(
        &self,
        merchant_id: i64,
        member_id: i64,
        amount: i64,
        kind: DebitKind,
        reason: &str,
    ) -> LoyaltyResult<MemberBalance> {
        if amount <= 0 {
            return Err(LoyaltyError::Validation(
                "debit amount must be a positive integer".into(),
            ));
        }
        let now = shared::util::now_millis();
        let mut tx = self.pool.begin().await.map_err(crate::db::repository::RepoError::from)?;

        let merchant = merchant::find_by_id(&mut *tx, merchant_id)
            .await?
            .ok_or(LoyaltyError::NotFound("merchant"))?;
        let mm = merchant_member::ensure(&mut tx, merchant_id, member_id).await?;

        let balance = match kind {
            DebitKind::Redeem => {
                // Dropping the open transaction on the error path rolls the
                // guard check back with it, leaving no partial write.
                apply_redeem_debit(&mut tx, &merchant, mm.id, amount, reason, member_id, None)
                    .await?
            }
            DebitKind::Adjust => {
                let actual = amount.min(mm.points);
                merchant_member::adjust_points_clamped(&mut *tx, mm.id, amount, now).await?;
                let balance = refresh_tier(&mut tx, &merchant, mm.id, now).await?;
                reward_transaction::insert(
                    &mut tx,
                    NewTransaction {
                        merchant_member_id: mm.id,
                        member_id,
                        merchant_id,
                        business_id: None,
                        kind: TransactionKind::Adjust,
                        amount: -actual,
                        usdc_amount: None,
                        points_deducted: None,
                        reason: reason.to_string(),
                        status: TransactionStatus::Success,
                    },
                )
                .await?;
                balance
            }
        };

        tx.commit().await.map_err(crate::db::repository::RepoError::from)?;
        tracing::debug!(merchant_id, member_id, amount, ?kind, "Points debited");
        Ok(balance)
    }

    /// Credit the merchant's birthday reward at most once per calendar year.
    /// Returns None when this year was already claimed.
    pub async fn claim_birthday_reward(
        &self,
        merchant_id: i64,
        member_id: i64,
        amount: i64,
    ) -> LoyaltyResult<Option<MemberBalance>> {
        if amount <= 0 {
            return Err(LoyaltyError::Validation(
                "birthday reward amount must be a positive integer".into(),
            ));
        }
        let now = shared::util::now_millis();
        let year = chrono::Utc::now().year() as i64;
        let mut tx = self.pool.begin().await.map_err(crate::db::repository::RepoError::from)?;

        let merchant = merchant::find_by_id(&mut *tx, merchant_id)
            .await?
            .ok_or(LoyaltyError::NotFound("merchant"))?;
        let mm = merchant_member::ensure(&mut tx, merchant_id, member_id).await?;

        if !merchant_member::mark_birthday_claim(&mut *tx, mm.id, year, now).await? {
            return Ok(None);
        }

        merchant_member::add_points(&mut *tx, mm.id, amount, now).await?;
        let balance = refresh_tier(&mut tx, &merchant, mm.id, now).await?;
        reward_transaction::insert(
            &mut tx,
            NewTransaction {
                merchant_member_id: mm.id,
                member_id,
                merchant_id,
                business_id: None,
                kind: TransactionKind::Adjust,
                amount,
                usdc_amount: None,
                points_deducted: None,
                reason: "Birthday reward".to_string(),
                status: TransactionStatus::Success,
            },
        )
        .await?;

        tx.commit().await.map_err(crate::db::repository::RepoError::from)?;
        Ok(Some(balance))
    }

    /// Ensure the ledger row exists and carries a referral code, assigning a
    /// fresh one on first touch.
    pub async fn ensure_with_referral(
        &self,
        merchant_id: i64,
        member_id: i64,
    ) -> LoyaltyResult<MerchantMember> {
        let now = shared::util::now_millis();
        let mut conn = self.pool.acquire().await.map_err(crate::db::repository::RepoError::from)?;
        let mm = merchant_member::ensure(&mut conn, merchant_id, member_id).await?;
        if mm.referral_code.is_some() {
            return Ok(mm);
        }
        let code = shared::util::opaque_token(4); // 8-char code
        merchant_member::assign_referral_code(&mut *conn, mm.id, &code, now).await?;
        merchant_member::find_by_id(&mut *conn, mm.id)
            .await?
            .ok_or(LoyaltyError::NotFound("member balance"))
    }

    /// Look up the member record (payout eligibility needs the wallet).
    pub async fn member(&self, member_id: i64) -> LoyaltyResult<Member> {
        member::find_by_id(&self.pool, member_id)
            .await?
            .ok_or(LoyaltyError::NotFound("member"))
    }
}

/// Re-read the balance and re-derive the tier inside an open transaction.
async fn refresh_tier(
    conn: &mut SqliteConnection,
    merchant: &Merchant,
    merchant_member_id: i64,
    now: i64,
) -> LoyaltyResult<MemberBalance> {
    let mm = merchant_member::find_by_id(&mut *conn, merchant_member_id)
        .await?
        .ok_or(LoyaltyError::NotFound("member balance"))?;
    let tier = tier_for_points(mm.points, merchant.vip_threshold, merchant.super_threshold);
    if tier != mm.tier {
        merchant_member::set_tier(&mut *conn, merchant_member_id, tier, now).await?;
    }
    Ok(MemberBalance {
        points: mm.points,
        tier,
    })
}

/// The redemption debit: guarded subtract, tier refresh, REDEEM transaction —
/// all against the caller's open transaction so the status transition in
/// `confirm` commits (or rolls back) together with the debit.
pub(crate) async fn apply_redeem_debit(
    conn: &mut SqliteConnection,
    merchant: &Merchant,
    merchant_member_id: i64,
    amount: i64,
    reason: &str,
    member_id: i64,
    business_id: Option<i64>,
) -> LoyaltyResult<MemberBalance> {
    let now = shared::util::now_millis();
    if !merchant_member::debit_points_guarded(&mut *conn, merchant_member_id, amount, now).await? {
        return Err(LoyaltyError::InsufficientBalance);
    }
    let balance = refresh_tier(conn, merchant, merchant_member_id, now).await?;
    reward_transaction::insert(
        conn,
        NewTransaction {
            merchant_member_id,
            member_id,
            merchant_id: merchant.id,
            business_id,
            kind: TransactionKind::Redeem,
            amount,
            usdc_amount: None,
            points_deducted: Some(amount),
            reason: reason.to_string(),
            status: TransactionStatus::Success,
        },
    )
    .await?;
    Ok(balance)
}
