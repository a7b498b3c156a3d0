//! Redemption State Machine
//!
//! `PENDING → {CONFIRMED, DECLINED, CANCELLED, EXPIRED}`, all terminal.
//!
//! A member creates a time-boxed request and receives a QR payload; staff
//! verify the token (read-only), then confirm or decline. Confirmation is the
//! authoritative step: inside one database transaction it re-checks the
//! status (compare-and-swap), re-checks the balance, debits the ledger and
//! appends the REDEEM transaction — either all of it commits or none of it
//! does. USDC rewards then hand off to the payout coordinator after the
//! commit, so a failed transfer can never unwind a legitimate debit.
//!
//! Expiry is lazy: verify/confirm/status flip overdue rows on read, which is
//! sufficient for correctness. The background sweep only keeps staff-facing
//! lists fresh.

use sqlx::SqlitePool;

use shared::models::{
    ConfirmRedemptionResponse, CreateRedemptionResponse, RedemptionRequest, RedemptionStatus,
    RedemptionStatusResponse, RewardType, VerifyRedemptionResponse,
};

use super::{LoyaltyError, LoyaltyResult, catalog, ledger};
use crate::db::repository::{
    RepoError, member, merchant, merchant_member, redemption, reward,
};
use super::payout::PayoutCoordinator;

/// QR payload prefix; the scanning UI strips it before calling verify.
pub const QR_PREFIX: &str = "gob:redeem:";

/// Fixed time-box for a pending request.
pub const REDEMPTION_TTL_MS: i64 = 10 * 60 * 1000;

#[derive(Clone)]
pub struct RedemptionEngine {
    pool: SqlitePool,
    payout: PayoutCoordinator,
}

impl RedemptionEngine {
    pub fn new(pool: SqlitePool, payout: PayoutCoordinator) -> Self {
        Self { pool, payout }
    }

    /// Create a redemption request for a member.
    ///
    /// Re-checks catalog visibility and the member's balance at request time;
    /// the balance check is advisory (the debit happens at confirm, where it
    /// is repeated). An existing live pending request for the same reward is
    /// returned instead of a duplicate.
    pub async fn create(
        &self,
        member_id: i64,
        merchant_id: i64,
        reward_id: i64,
        business_id: Option<i64>,
        member_note: Option<String>,
    ) -> LoyaltyResult<CreateRedemptionResponse> {
        let now = shared::util::now_millis();
        let mut tx = self.pool.begin().await.map_err(RepoError::from)?;

        let merchant = merchant::find_by_id(&mut *tx, merchant_id)
            .await?
            .ok_or(LoyaltyError::NotFound("merchant"))?;
        let reward = reward::find_by_id(&mut *tx, reward_id)
            .await?
            .filter(|r| r.merchant_id == merchant_id && r.is_active)
            .ok_or(LoyaltyError::NotFound("reward"))?;

        // Plan gate, same function the catalog display uses
        let active = reward::find_active_by_merchant(&mut *tx, merchant_id).await?;
        if !catalog::is_redeemable(&merchant.plan, &active, reward_id) {
            return Err(LoyaltyError::PlanRestricted);
        }

        let mm = merchant_member::ensure(&mut tx, merchant_id, member_id).await?;
        if mm.points < reward.points_cost {
            return Err(LoyaltyError::InsufficientPoints {
                have: mm.points,
                need: reward.points_cost,
            });
        }

        // A timed-out request that the sweep has not reached yet still holds
        // the one-live-pending slot; release it first.
        redemption::expire_stale_for(&mut *tx, member_id, merchant_id, reward_id, now).await?;

        // Debounce: one live pending request per (member, reward)
        if let Some(existing) =
            redemption::find_pending(&mut *tx, member_id, merchant_id, reward_id, now).await?
        {
            tx.commit().await.map_err(RepoError::from)?;
            return Ok(respond_created(existing, true));
        }

        let token = shared::util::opaque_token(32);
        let inserted = redemption::insert(
            &mut tx,
            member_id,
            merchant_id,
            reward_id,
            business_id,
            &token,
            member_note.as_deref(),
            now,
            now + REDEMPTION_TTL_MS,
        )
        .await;

        let request = match inserted {
            Ok(request) => request,
            // Lost a concurrent-create race on the partial unique index:
            // surface the winner instead
            Err(RepoError::Duplicate(_)) => {
                drop(tx);
                let existing =
                    redemption::find_pending(&self.pool, member_id, merchant_id, reward_id, now)
                        .await?
                        .ok_or(LoyaltyError::NotFound("redemption"))?;
                return Ok(respond_created(existing, true));
            }
            Err(e) => return Err(e.into()),
        };

        tx.commit().await.map_err(RepoError::from)?;
        tracing::info!(
            redemption_id = request.id,
            member_id,
            merchant_id,
            reward_id,
            "Redemption request created"
        );
        Ok(respond_created(request, false))
    }

    /// Staff-facing token verification. Read-only apart from lazy expiry.
    pub async fn verify(
        &self,
        qr_code_hash: &str,
        merchant_id: i64,
    ) -> LoyaltyResult<VerifyRedemptionResponse> {
        let now = shared::util::now_millis();
        let request = redemption::find_by_token(&self.pool, qr_code_hash)
            .await?
            .ok_or(LoyaltyError::NotFound("redemption"))?;

        // Tenant check comes first: merchant B learns nothing about
        // merchant A's request, not even its state.
        if request.merchant_id != merchant_id {
            return Err(LoyaltyError::WrongMerchant);
        }
        self.require_live_pending(&request, now).await?;

        let reward = reward::find_by_id(&self.pool, request.reward_id)
            .await?
            .ok_or(LoyaltyError::NotFound("reward"))?;
        let member = member::find_by_id(&self.pool, request.member_id)
            .await?
            .ok_or(LoyaltyError::NotFound("member"))?;
        let mm = merchant_member::find(&self.pool, merchant_id, request.member_id)
            .await?
            .ok_or(LoyaltyError::NotFound("member balance"))?;

        Ok(VerifyRedemptionResponse {
            redemption_id: request.id,
            member_id: member.id,
            member_email: member.email,
            reward_id: reward.id,
            reward_name: reward.name,
            points_cost: reward.points_cost,
            member_points: mm.points,
            member_tier: mm.tier,
            member_note: request.member_note,
            expires_in_secs: (request.expires_at - now).max(0) / 1000,
        })
    }

    /// Staff confirmation — the authoritative transition.
    ///
    /// Exactly one of N concurrent confirms wins the status CAS; losers see
    /// `AlreadyConfirmed`. An insufficient balance at confirm time rolls the
    /// whole transaction back and leaves the request PENDING (it may still
    /// expire, or be cancelled/declined explicitly).
    pub async fn confirm(
        &self,
        redemption_id: i64,
        merchant_id: i64,
        business_id_override: Option<i64>,
    ) -> LoyaltyResult<ConfirmRedemptionResponse> {
        let now = shared::util::now_millis();
        let mut tx = self.pool.begin().await.map_err(RepoError::from)?;

        redemption::expire_if_stale(&mut *tx, redemption_id, now).await?;
        let request = redemption::find_by_id(&mut *tx, redemption_id)
            .await?
            .ok_or(LoyaltyError::NotFound("redemption"))?;
        if request.merchant_id != merchant_id {
            return Err(LoyaltyError::WrongMerchant);
        }
        require_pending(&request)?;

        let merchant = merchant::find_by_id(&mut *tx, merchant_id)
            .await?
            .ok_or(LoyaltyError::NotFound("merchant"))?;
        let reward = reward::find_by_id(&mut *tx, request.reward_id)
            .await?
            .ok_or(LoyaltyError::NotFound("reward"))?;
        let mm = merchant_member::find(&mut *tx, merchant_id, request.member_id)
            .await?
            .ok_or(LoyaltyError::NotFound("member balance"))?;

        // CAS the status before the debit; both are inside this transaction,
        // so they land together or not at all.
        if !redemption::confirm_pending(&mut *tx, redemption_id, merchant_id, now).await? {
            // Lost a race between the read above and the CAS
            let current = redemption::find_by_id(&mut *tx, redemption_id)
                .await?
                .ok_or(LoyaltyError::NotFound("redemption"))?;
            return Err(state_error(&current));
        }

        let business_id = business_id_override.or(request.business_id);
        let reason = format!("Redeemed: {}", reward.name);
        let new_balance = ledger::apply_redeem_debit(
            &mut tx,
            &merchant,
            mm.id,
            reward.points_cost,
            &reason,
            request.member_id,
            business_id,
        )
        .await
        .map_err(|e| match e {
            // Surface the balance shortfall; dropping the transaction rolls
            // the CAS back so the request stays PENDING.
            LoyaltyError::InsufficientBalance => LoyaltyError::InsufficientPoints {
                have: mm.points,
                need: reward.points_cost,
            },
            other => other,
        })?;

        tx.commit().await.map_err(RepoError::from)?;
        tracing::info!(
            redemption_id,
            merchant_id,
            member_id = request.member_id,
            points = reward.points_cost,
            "Redemption confirmed"
        );

        // Payout happens after the commit: the points are spent either way,
        // and a transfer failure is an operational incident, not a rollback.
        let payout = if reward.reward_type == RewardType::UsdcPayout {
            let member = member::find_by_id(&self.pool, request.member_id)
                .await?
                .ok_or(LoyaltyError::NotFound("member"))?;
            Some(
                self.payout
                    .execute(
                        &self.pool,
                        &merchant,
                        &member,
                        mm.id,
                        reward.usdc_amount,
                        reward.points_cost,
                        redemption_id,
                    )
                    .await?,
            )
        } else {
            None
        };

        Ok(ConfirmRedemptionResponse {
            redemption_id,
            reward_name: reward.name,
            points_deducted: reward.points_cost,
            new_balance,
            payout,
        })
    }

    /// Staff decline. PENDING-only; no ledger effect.
    pub async fn decline(
        &self,
        redemption_id: i64,
        merchant_id: i64,
        reason: Option<String>,
    ) -> LoyaltyResult<()> {
        let now = shared::util::now_millis();
        let mut tx = self.pool.begin().await.map_err(RepoError::from)?;

        redemption::expire_if_stale(&mut *tx, redemption_id, now).await?;
        let request = redemption::find_by_id(&mut *tx, redemption_id)
            .await?
            .ok_or(LoyaltyError::NotFound("redemption"))?;
        if request.merchant_id != merchant_id {
            return Err(LoyaltyError::WrongMerchant);
        }
        require_pending(&request)?;

        if !redemption::decline_pending(&mut *tx, redemption_id, merchant_id, reason.as_deref(), now)
            .await?
        {
            let current = redemption::find_by_id(&mut *tx, redemption_id)
                .await?
                .ok_or(LoyaltyError::NotFound("redemption"))?;
            return Err(state_error(&current));
        }

        tx.commit().await.map_err(RepoError::from)?;
        tracing::info!(redemption_id, merchant_id, "Redemption declined");
        Ok(())
    }

    /// Member cancellation. PENDING-only, owner-only; no ledger effect.
    /// Distinguished from decline by actor and status value.
    pub async fn cancel(&self, redemption_id: i64, member_id: i64) -> LoyaltyResult<()> {
        let now = shared::util::now_millis();
        let mut tx = self.pool.begin().await.map_err(RepoError::from)?;

        redemption::expire_if_stale(&mut *tx, redemption_id, now).await?;
        let request = redemption::find_by_id(&mut *tx, redemption_id)
            .await?
            // A foreign member learns nothing, not even existence
            .filter(|r| r.member_id == member_id)
            .ok_or(LoyaltyError::NotFound("redemption"))?;
        require_pending(&request)?;

        if !redemption::cancel_pending(&mut *tx, redemption_id, member_id).await? {
            let current = redemption::find_by_id(&mut *tx, redemption_id)
                .await?
                .ok_or(LoyaltyError::NotFound("redemption"))?;
            return Err(state_error(&current));
        }

        tx.commit().await.map_err(RepoError::from)?;
        tracing::info!(redemption_id, member_id, "Redemption cancelled by member");
        Ok(())
    }

    /// Member status poll. Lazily expires before reporting.
    pub async fn status(
        &self,
        redemption_id: i64,
        member_id: i64,
    ) -> LoyaltyResult<RedemptionStatusResponse> {
        let now = shared::util::now_millis();
        redemption::expire_if_stale(&self.pool, redemption_id, now).await?;
        let request = redemption::find_by_id(&self.pool, redemption_id)
            .await?
            .filter(|r| r.member_id == member_id)
            .ok_or(LoyaltyError::NotFound("redemption"))?;
        Ok(RedemptionStatusResponse {
            redemption_id: request.id,
            status: request.status,
            expires_at: request.expires_at,
        })
    }

    /// Bulk-expire overdue pending requests (background sweep).
    pub async fn expire_stale(&self) -> LoyaltyResult<u64> {
        let now = shared::util::now_millis();
        Ok(redemption::expire_stale(&self.pool, now).await?)
    }

    /// Verify-path state check with lazy expiry against the pool.
    async fn require_live_pending(
        &self,
        request: &RedemptionRequest,
        now: i64,
    ) -> LoyaltyResult<()> {
        if request.status == RedemptionStatus::Pending && request.expires_at <= now {
            redemption::expire_if_stale(&self.pool, request.id, now).await?;
            return Err(LoyaltyError::Expired);
        }
        require_pending(request)
    }
}

fn respond_created(request: RedemptionRequest, reused: bool) -> CreateRedemptionResponse {
    CreateRedemptionResponse {
        redemption_id: request.id,
        qr_code_data: format!("{QR_PREFIX}{}", request.qr_code_hash),
        qr_code_hash: request.qr_code_hash,
        expires_at: request.expires_at,
        reused,
    }
}

/// Map a non-pending request to its status-specific error.
fn require_pending(request: &RedemptionRequest) -> LoyaltyResult<()> {
    match request.status {
        RedemptionStatus::Pending => Ok(()),
        _ => Err(state_error(request)),
    }
}

fn state_error(request: &RedemptionRequest) -> LoyaltyError {
    match request.status {
        RedemptionStatus::Confirmed => LoyaltyError::AlreadyConfirmed,
        RedemptionStatus::Declined => LoyaltyError::AlreadyDeclined,
        RedemptionStatus::Cancelled => LoyaltyError::AlreadyCancelled,
        RedemptionStatus::Expired => LoyaltyError::Expired,
        // CAS refused a PENDING row only because its expiry just passed
        RedemptionStatus::Pending => LoyaltyError::Expired,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sqlx::SqlitePool;

    use super::*;
    use crate::db::repository::{merchant as merchant_repo, redemption as redemption_repo};
    use crate::db::repository::reward_transaction;
    use crate::db::test_support::{
        merchant_fixture, seed_member, seed_merchant, seed_reward, seed_usdc_reward, test_pool,
    };
    use crate::loyalty::ledger::{CreditKind, DebitKind, PointsLedger};
    use crate::loyalty::payout::{LogNotifier, MockPayoutProvider, PayoutProvider};
    use shared::models::{Plan, TransactionKind, TransactionStatus};

    fn engine_with(pool: &SqlitePool, provider: Arc<dyn PayoutProvider>) -> RedemptionEngine {
        RedemptionEngine::new(
            pool.clone(),
            PayoutCoordinator::new(provider, Arc::new(LogNotifier)),
        )
    }

    fn engine(pool: &SqlitePool) -> RedemptionEngine {
        engine_with(pool, Arc::new(MockPayoutProvider::succeeding()))
    }

    async fn redeem_tx_count(pool: &SqlitePool, merchant_id: i64) -> usize {
        reward_transaction::list_by_merchant(pool, merchant_id, 100)
            .await
            .unwrap()
            .iter()
            .filter(|t| t.kind == TransactionKind::Redeem)
            .count()
    }

    #[tokio::test]
    async fn happy_path_create_verify_confirm() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let ledger = PointsLedger::new(pool.clone());
        let engine = engine(&pool);

        ledger
            .credit(merchant.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();

        let before = shared::util::now_millis();
        let created = engine
            .create(member.id, merchant.id, reward.id, None, Some("table 4".into()))
            .await
            .unwrap();
        assert!(created.qr_code_data.starts_with(QR_PREFIX));
        assert!(!created.reused);
        assert!(created.expires_at >= before + REDEMPTION_TTL_MS);
        assert!(created.expires_at <= shared::util::now_millis() + REDEMPTION_TTL_MS);

        let verified = engine.verify(&created.qr_code_hash, merchant.id).await.unwrap();
        assert_eq!(verified.redemption_id, created.redemption_id);
        assert_eq!(verified.points_cost, 100);
        assert_eq!(verified.member_points, 150);
        assert_eq!(verified.member_note.as_deref(), Some("table 4"));
        assert!(verified.expires_in_secs > 0 && verified.expires_in_secs <= 600);

        let confirmed = engine
            .confirm(created.redemption_id, merchant.id, None)
            .await
            .unwrap();
        assert_eq!(confirmed.points_deducted, 100);
        assert_eq!(confirmed.new_balance.points, 50);
        assert_eq!(confirmed.reward_name, reward.name);
        assert!(confirmed.payout.is_none());

        // Exactly one REDEEM transaction of the reward's cost
        assert_eq!(redeem_tx_count(&pool, merchant.id).await, 1);

        let status = engine.status(created.redemption_id, member.id).await.unwrap();
        assert_eq!(status.status, RedemptionStatus::Confirmed);
    }

    #[tokio::test]
    async fn create_rejects_insufficient_points() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;

        let err = engine(&pool)
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::InsufficientPoints { have: 0, need: 100 }
        ));
    }

    #[tokio::test]
    async fn create_rejects_greyed_reward() {
        let pool = test_pool().await;
        let mut fixture = merchant_fixture("starter-cafe");
        fixture.plan = Plan::Starter; // limit 3
        let mut conn = pool.acquire().await.unwrap();
        let merchant = merchant_repo::create(&mut conn, fixture).await.unwrap();
        drop(conn);
        let member = seed_member(&pool, "a@example.com").await;

        let mut last = None;
        for cost in [10, 20, 30, 40] {
            last = Some(seed_reward(&pool, merchant.id, cost).await);
        }
        let greyed = last.unwrap(); // highest cost sorts last, beyond the limit

        PointsLedger::new(pool.clone())
            .credit(merchant.id, member.id, 1000, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();

        let err = engine(&pool)
            .create(member.id, merchant.id, greyed.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::PlanRestricted));
    }

    #[tokio::test]
    async fn create_debounces_duplicate_pending() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let engine = engine(&pool);

        PointsLedger::new(pool.clone())
            .credit(merchant.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();

        let first = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();
        let second = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();
        assert!(second.reused);
        assert_eq!(second.redemption_id, first.redemption_id);
        assert_eq!(second.qr_code_hash, first.qr_code_hash);
    }

    #[tokio::test]
    async fn verify_is_cross_tenant_isolated() {
        let pool = test_pool().await;
        let merchant_a = seed_merchant(&pool, "cafe-a").await;
        let merchant_b = seed_merchant(&pool, "cafe-b").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant_a.id, 100).await;
        let engine = engine(&pool);

        PointsLedger::new(pool.clone())
            .credit(merchant_a.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();
        let created = engine
            .create(member.id, merchant_a.id, reward.id, None, None)
            .await
            .unwrap();

        let err = engine.verify(&created.qr_code_hash, merchant_b.id).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::WrongMerchant));

        let err = engine
            .confirm(created.redemption_id, merchant_b.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::WrongMerchant));

        // Still confirmable by the right merchant
        engine.confirm(created.redemption_id, merchant_a.id, None).await.unwrap();
    }

    #[tokio::test]
    async fn verify_unknown_token_not_found() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let err = engine(&pool).verify("no-such-token", merchant.id).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::NotFound("redemption")));
    }

    #[tokio::test]
    async fn expired_request_can_never_confirm() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let engine = engine(&pool);

        PointsLedger::new(pool.clone())
            .credit(merchant.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();

        // Insert an already-overdue pending request directly
        let now = shared::util::now_millis();
        let mut conn = pool.acquire().await.unwrap();
        let request = redemption_repo::insert(
            &mut conn, member.id, merchant.id, reward.id, None, "stale-token", None,
            now - REDEMPTION_TTL_MS - 1000, now - 1000,
        )
        .await
        .unwrap();
        drop(conn);

        let err = engine.verify("stale-token", merchant.id).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::Expired));

        let err = engine.confirm(request.id, merchant.id, None).await.unwrap_err();
        assert!(matches!(err, LoyaltyError::Expired));

        // Lazy expiry flipped the row; no debit happened
        let after = redemption_repo::find_by_id(&pool, request.id).await.unwrap().unwrap();
        assert_eq!(after.status, RedemptionStatus::Expired);
        assert_eq!(redeem_tx_count(&pool, merchant.id).await, 0);
    }

    #[tokio::test]
    async fn insufficient_at_confirm_time_leaves_request_pending() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let ledger = PointsLedger::new(pool.clone());
        let engine = engine(&pool);

        ledger
            .credit(merchant.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();
        let created = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();

        // A separate process drains the balance between create and confirm
        ledger
            .debit(merchant.id, member.id, 100, DebitKind::Redeem, "Redeemed elsewhere")
            .await
            .unwrap();

        let err = engine
            .confirm(created.redemption_id, merchant.id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoyaltyError::InsufficientPoints { have: 50, need: 100 }
        ));

        // Request stays PENDING and no second REDEEM row exists
        let after = redemption_repo::find_by_id(&pool, created.redemption_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.status, RedemptionStatus::Pending);
        assert_eq!(redeem_tx_count(&pool, merchant.id).await, 1);

        let balance = ledger.balance(merchant.id, member.id).await.unwrap();
        assert_eq!(balance.points, 50);
    }

    #[tokio::test]
    async fn second_confirm_fails_after_first_wins() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let engine = engine(&pool);

        PointsLedger::new(pool.clone())
            .credit(merchant.id, member.id, 300, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();
        let created = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();

        engine.confirm(created.redemption_id, merchant.id, None).await.unwrap();
        let err = engine
            .confirm(created.redemption_id, merchant.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::AlreadyConfirmed));
    }

    #[tokio::test]
    async fn concurrent_confirms_debit_exactly_once() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let engine = engine(&pool);
        let ledger = PointsLedger::new(pool.clone());

        ledger
            .credit(merchant.id, member.id, 300, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();
        let created = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();

        // Staff double-tap: both confirms race on the status CAS
        let (a, b) = tokio::join!(
            engine.confirm(created.redemption_id, merchant.id, None),
            engine.confirm(created.redemption_id, merchant.id, None),
        );
        let wins = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(
            [&a, &b]
                .iter()
                .any(|r| matches!(r, Err(LoyaltyError::AlreadyConfirmed)))
        );

        // Debited exactly once
        assert_eq!(redeem_tx_count(&pool, merchant.id).await, 1);
        let balance = ledger.balance(merchant.id, member.id).await.unwrap();
        assert_eq!(balance.points, 200);
    }

    #[tokio::test]
    async fn decline_and_cancel_leave_ledger_untouched() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let stranger = seed_member(&pool, "b@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let other = seed_reward(&pool, merchant.id, 120).await;
        let engine = engine(&pool);
        let ledger = PointsLedger::new(pool.clone());

        ledger
            .credit(merchant.id, member.id, 300, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();

        // Staff decline
        let declined = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();
        engine
            .decline(declined.redemption_id, merchant.id, Some("out of stock".into()))
            .await
            .unwrap();
        let row = redemption_repo::find_by_id(&pool, declined.redemption_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, RedemptionStatus::Declined);
        assert_eq!(row.decline_reason.as_deref(), Some("out of stock"));

        // Member cancel — a stranger cannot, the owner can
        let cancelled = engine
            .create(member.id, merchant.id, other.id, None, None)
            .await
            .unwrap();
        let err = engine
            .cancel(cancelled.redemption_id, stranger.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::NotFound("redemption")));
        engine.cancel(cancelled.redemption_id, member.id).await.unwrap();
        let row = redemption_repo::find_by_id(&pool, cancelled.redemption_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, RedemptionStatus::Cancelled);

        // Neither touched the ledger
        assert_eq!(redeem_tx_count(&pool, merchant.id).await, 0);
        let balance = ledger.balance(merchant.id, member.id).await.unwrap();
        assert_eq!(balance.points, 300);

        // Terminal states stay terminal
        let err = engine
            .confirm(declined.redemption_id, merchant.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::AlreadyDeclined));
        let err = engine
            .confirm(cancelled.redemption_id, merchant.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::AlreadyCancelled));
    }

    #[tokio::test]
    async fn usdc_payout_success_settles_transaction() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_usdc_reward(&pool, merchant.id, 100, 5.0).await;
        let engine = engine(&pool); // succeeding provider

        PointsLedger::new(pool.clone())
            .credit(merchant.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();
        let created = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();
        let confirmed = engine
            .confirm(created.redemption_id, merchant.id, None)
            .await
            .unwrap();

        let payout = confirmed.payout.expect("USDC reward produces a payout outcome");
        assert_eq!(payout.status, TransactionStatus::Success);
        assert!(payout.tx_hash.is_some());
        assert!((payout.usdc_amount - 5.0).abs() < f64::EPSILON);

        let row = reward_transaction::find_by_id(&pool, payout.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.kind, TransactionKind::Payout);
        assert_eq!(row.status, TransactionStatus::Success);
        assert_eq!(row.points_deducted, Some(100));
    }

    #[tokio::test]
    async fn payout_failure_does_not_roll_back_the_debit() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_usdc_reward(&pool, merchant.id, 100, 5.0).await;
        let engine = engine_with(&pool, Arc::new(MockPayoutProvider::failing("rpc down")));
        let ledger = PointsLedger::new(pool.clone());

        ledger
            .credit(merchant.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();
        let created = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();

        // Confirm still reports success for the points transaction
        let confirmed = engine
            .confirm(created.redemption_id, merchant.id, None)
            .await
            .unwrap();
        assert_eq!(confirmed.new_balance.points, 50);

        let payout = confirmed.payout.expect("payout outcome present");
        assert_eq!(payout.status, TransactionStatus::Failed);
        assert!(payout.error_message.unwrap().contains("rpc down"));

        // Points stay spent and the request stays CONFIRMED
        assert_eq!(ledger.balance(merchant.id, member.id).await.unwrap().points, 50);
        let row = redemption_repo::find_by_id(&pool, created.redemption_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, RedemptionStatus::Confirmed);
        assert_eq!(redeem_tx_count(&pool, merchant.id).await, 1);
    }

    #[tokio::test]
    async fn payout_refused_beyond_monthly_budget() {
        let pool = test_pool().await;
        let mut fixture = merchant_fixture("capped-cafe");
        fixture.payout_monthly_budget_usd = Some(8.0);
        let mut conn = pool.acquire().await.unwrap();
        let merchant = merchant_repo::create(&mut conn, fixture).await.unwrap();
        drop(conn);

        let alice = seed_member(&pool, "alice@example.com").await;
        let bob = seed_member(&pool, "bob@example.com").await;
        let reward = seed_usdc_reward(&pool, merchant.id, 100, 5.0).await;
        let engine = engine(&pool);
        let ledger = PointsLedger::new(pool.clone());

        for m in [&alice, &bob] {
            ledger
                .credit(merchant.id, m.id, 150, CreditKind::Earn, "Visit", None)
                .await
                .unwrap();
        }

        // First payout fits the 8 USD budget
        let first = engine
            .create(alice.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();
        let confirmed = engine.confirm(first.redemption_id, merchant.id, None).await.unwrap();
        assert_eq!(confirmed.payout.unwrap().status, TransactionStatus::Success);

        // Second would take the window to 10 USD — refused, points stay spent
        let second = engine
            .create(bob.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();
        let confirmed = engine.confirm(second.redemption_id, merchant.id, None).await.unwrap();
        let payout = confirmed.payout.unwrap();
        assert_eq!(payout.status, TransactionStatus::Failed);
        assert!(payout.error_message.unwrap().contains("budget"));
        assert_eq!(ledger.balance(merchant.id, bob.id).await.unwrap().points, 50);
    }

    #[tokio::test]
    async fn stale_pending_does_not_block_new_request() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;
        let engine = engine(&pool);

        PointsLedger::new(pool.clone())
            .credit(merchant.id, member.id, 150, CreditKind::Earn, "Visit", None)
            .await
            .unwrap();

        // An overdue pending request the sweep has not flipped yet
        let now = shared::util::now_millis();
        let mut conn = pool.acquire().await.unwrap();
        let stale = redemption_repo::insert(
            &mut conn, member.id, merchant.id, reward.id, None, "stale-token", None,
            now - REDEMPTION_TTL_MS - 1000, now - 1000,
        )
        .await
        .unwrap();
        drop(conn);

        // Create releases the slot and issues a fresh token
        let created = engine
            .create(member.id, merchant.id, reward.id, None, None)
            .await
            .unwrap();
        assert!(!created.reused);
        assert_ne!(created.qr_code_hash, "stale-token");

        let old = redemption_repo::find_by_id(&pool, stale.id).await.unwrap().unwrap();
        assert_eq!(old.status, RedemptionStatus::Expired);
    }

    #[tokio::test]
    async fn status_poll_flips_overdue_request() {
        let pool = test_pool().await;
        let merchant = seed_merchant(&pool, "cafe").await;
        let member = seed_member(&pool, "a@example.com").await;
        let reward = seed_reward(&pool, merchant.id, 100).await;

        let now = shared::util::now_millis();
        let mut conn = pool.acquire().await.unwrap();
        let request = redemption_repo::insert(
            &mut conn, member.id, merchant.id, reward.id, None, "stale-token", None,
            now - REDEMPTION_TTL_MS - 1000, now - 1000,
        )
        .await
        .unwrap();
        drop(conn);

        let status = engine(&pool).status(request.id, member.id).await.unwrap();
        assert_eq!(status.status, RedemptionStatus::Expired);
    }
}
