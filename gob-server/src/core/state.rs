use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::Config;
use crate::db::DbService;
use crate::loyalty::ledger::PointsLedger;
use crate::loyalty::payout::{
    LogNotifier, MockPayoutProvider, PayoutCoordinator, PayoutProvider, UnconfiguredPayoutProvider,
};
use crate::loyalty::redemption::RedemptionEngine;

/// Server state — shared handles to every service.
///
/// Cheap to clone: the pool and every service hold `Arc`/pool clones.
///
/// | Field | Description |
/// |-------|-------------|
/// | config | Immutable configuration |
/// | pool | SQLite connection pool |
/// | ledger | Points ledger (balance/credit/debit + tier) |
/// | redemptions | Redemption state machine + payout coordination |
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub pool: SqlitePool,
    pub ledger: PointsLedger,
    pub redemptions: RedemptionEngine,
}

impl ServerState {
    /// Open the database, run migrations, and wire up the loyalty services.
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        let db = DbService::new(&config.db_path).await?;

        let provider: Arc<dyn PayoutProvider> = match config.payout_provider.as_str() {
            "mock" => {
                tracing::warn!("Using mock payout provider — transfers are simulated");
                Arc::new(MockPayoutProvider::succeeding())
            }
            other => {
                if other != "none" {
                    tracing::warn!(provider = other, "Unknown payout provider, payouts disabled");
                }
                Arc::new(UnconfiguredPayoutProvider)
            }
        };
        let coordinator = PayoutCoordinator::new(provider, Arc::new(LogNotifier));

        Ok(Self {
            config: Arc::new(config.clone()),
            ledger: PointsLedger::new(db.pool.clone()),
            redemptions: RedemptionEngine::new(db.pool.clone(), coordinator),
            pool: db.pool,
        })
    }
}
