//! Payout Coordinator
//!
//! The on-chain USDC transfer itself lives behind the [`PayoutProvider`]
//! seam; this module owns everything around it: the monthly budget cap, the
//! PAYOUT transaction row (PENDING while in flight), settlement, and the
//! success notification. A failed transfer never unwinds the points debit
//! that preceded it — the failure is recorded for manual remediation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;
use sqlx::SqlitePool;
use thiserror::Error;

use shared::models::{
    Member, Merchant, NewTransaction, PayoutOutcome, TransactionKind, TransactionStatus,
};

use super::LoyaltyResult;
use crate::db::repository::{RepoError, reward_transaction};

#[derive(Debug, Error)]
pub enum PayoutError {
    /// The backend refused the transfer (bad destination, compliance, ...)
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached or died mid-flight
    #[error("transfer failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
pub struct PayoutReceipt {
    pub tx_hash: String,
}

/// On-chain transfer backend.
///
/// `idempotency_key` is the PAYOUT transaction id; a backend retrying a
/// delivery must not double-spend under the same key.
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    async fn transfer(
        &self,
        wallet_address: &str,
        usd_amount: f64,
        idempotency_key: i64,
    ) -> Result<PayoutReceipt, PayoutError>;
}

/// Fire-and-forget member notification. Failures are logged, never surfaced.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payout_succeeded(
        &self,
        member_email: Option<&str>,
        merchant_name: &str,
        usd_amount: f64,
        tx_hash: &str,
    );
}

/// Default notifier: structured log only (email delivery is handled by an
/// external dispatcher subscribed to the same events in production).
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn payout_succeeded(
        &self,
        member_email: Option<&str>,
        merchant_name: &str,
        usd_amount: f64,
        tx_hash: &str,
    ) {
        tracing::info!(
            member_email = member_email.unwrap_or("<wallet-only>"),
            merchant = merchant_name,
            usd_amount,
            tx_hash,
            "USDC payout succeeded"
        );
    }
}

/// Stand-in when no transfer backend is configured: every transfer fails and
/// lands on the PAYOUT row as FAILED for manual remediation.
pub struct UnconfiguredPayoutProvider;

#[async_trait]
impl PayoutProvider for UnconfiguredPayoutProvider {
    async fn transfer(
        &self,
        _wallet_address: &str,
        _usd_amount: f64,
        _idempotency_key: i64,
    ) -> Result<PayoutReceipt, PayoutError> {
        Err(PayoutError::Transport(
            "no payout provider configured".into(),
        ))
    }
}

/// Simulated backend for tests and local development.
pub struct MockPayoutProvider {
    fail_with: Option<String>,
}

impl MockPayoutProvider {
    pub fn succeeding() -> Self {
        Self { fail_with: None }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
        }
    }
}

#[async_trait]
impl PayoutProvider for MockPayoutProvider {
    async fn transfer(
        &self,
        _wallet_address: &str,
        _usd_amount: f64,
        idempotency_key: i64,
    ) -> Result<PayoutReceipt, PayoutError> {
        match &self.fail_with {
            Some(msg) => Err(PayoutError::Transport(msg.clone())),
            None => Ok(PayoutReceipt {
                tx_hash: format!("0xmock{idempotency_key:016x}"),
            }),
        }
    }
}

/// Start of the merchant's current monthly budget window: the most recent
/// occurrence of `reset_day` at 00:00 UTC. Reset day is clamped to 1-28 so
/// every month has the day.
pub fn budget_window_start(now_ms: i64, reset_day: i64) -> i64 {
    let day = reset_day.clamp(1, 28) as u32;
    let now = chrono::DateTime::from_timestamp_millis(now_ms).unwrap_or_else(chrono::Utc::now);
    let today = now.date_naive();

    let (year, month) = if today.day() >= day {
        (today.year(), today.month())
    } else if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(now_ms)
}

#[derive(Clone)]
pub struct PayoutCoordinator {
    provider: Arc<dyn PayoutProvider>,
    notifier: Arc<dyn Notifier>,
}

impl PayoutCoordinator {
    pub fn new(provider: Arc<dyn PayoutProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self { provider, notifier }
    }

    /// Execute a payout for a confirmed redemption.
    ///
    /// Records the PAYOUT transaction (PENDING), then settles it with the
    /// transfer result. The budget cap and wallet precondition are checked
    /// before the backend is invoked; a refusal settles the row FAILED
    /// without attempting a transfer. Only storage errors propagate.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        pool: &SqlitePool,
        merchant: &Merchant,
        member: &Member,
        merchant_member_id: i64,
        usdc_amount: Option<f64>,
        points_deducted: i64,
        redemption_id: i64,
    ) -> LoyaltyResult<PayoutOutcome> {
        let now = shared::util::now_millis();

        // Budget consumed so far, measured before this row exists.
        let spent = match merchant.payout_monthly_budget_usd {
            Some(_) => {
                let window = budget_window_start(now, merchant.payout_budget_reset_day);
                reward_transaction::payout_total_since(pool, merchant.id, window).await?
            }
            None => 0.0,
        };

        let amount = usdc_amount.unwrap_or(0.0);
        let mut conn = pool.acquire().await.map_err(RepoError::from)?;
        let row = reward_transaction::insert(
            &mut conn,
            NewTransaction {
                merchant_member_id,
                member_id: member.id,
                merchant_id: merchant.id,
                business_id: None,
                kind: TransactionKind::Payout,
                amount: 0,
                usdc_amount: Some(amount),
                points_deducted: Some(points_deducted),
                reason: format!("USDC payout for redemption {redemption_id}"),
                status: TransactionStatus::Pending,
            },
        )
        .await?;
        drop(conn);

        // Preconditions that refuse without touching the backend.
        let refusal = if !merchant.payout_enabled {
            Some("payouts are disabled for this merchant".to_string())
        } else if usdc_amount.is_none() {
            Some("reward has no USDC amount configured".to_string())
        } else if member.wallet_address.is_none() {
            Some("member has no wallet address on file".to_string())
        } else if let Some(cap) = merchant.payout_monthly_budget_usd {
            if spent + amount > cap {
                Some(format!(
                    "monthly payout budget exceeded ({spent:.2} + {amount:.2} > {cap:.2} USD)"
                ))
            } else {
                None
            }
        } else {
            None
        };

        if let Some(message) = refusal {
            tracing::warn!(
                merchant_id = merchant.id,
                member_id = member.id,
                redemption_id,
                reason = %message,
                "Payout refused"
            );
            return self.settle(pool, row.id, Err(PayoutError::Rejected(message))).await;
        }

        let wallet = member.wallet_address.as_deref().unwrap_or_default();
        let result = self.provider.transfer(wallet, amount, row.id).await;

        if let Ok(receipt) = &result {
            self.notifier
                .payout_succeeded(
                    member.email.as_deref(),
                    &merchant.name,
                    amount,
                    &receipt.tx_hash,
                )
                .await;
        }
        self.settle(pool, row.id, result).await
    }

    /// Flip the PENDING row to its terminal status and return the outcome.
    async fn settle(
        &self,
        pool: &SqlitePool,
        transaction_id: i64,
        result: Result<PayoutReceipt, PayoutError>,
    ) -> LoyaltyResult<PayoutOutcome> {
        match &result {
            Ok(receipt) => {
                reward_transaction::settle_payout(
                    pool,
                    transaction_id,
                    TransactionStatus::Success,
                    Some(&receipt.tx_hash),
                    None,
                )
                .await?;
            }
            Err(e) => {
                tracing::error!(
                    transaction_id,
                    error = %e,
                    "Payout failed; points remain spent, manual remediation required"
                );
                reward_transaction::settle_payout(
                    pool,
                    transaction_id,
                    TransactionStatus::Failed,
                    None,
                    Some(&e.to_string()),
                )
                .await?;
            }
        }

        let row = reward_transaction::find_by_id(pool, transaction_id)
            .await?
            .ok_or(super::LoyaltyError::NotFound("payout transaction"))?;
        Ok(PayoutOutcome {
            transaction_id: row.id,
            usdc_amount: row.usdc_amount.unwrap_or(0.0),
            status: row.status,
            tx_hash: row.tx_hash,
            error_message: row.error_message,
        })
    }
}
