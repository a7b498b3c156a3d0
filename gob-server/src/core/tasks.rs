//! Background tasks
//!
//! The only long-running task is the stale-redemption sweep. Lazy expiry on
//! verify/confirm/status already guarantees an expired request can never be
//! confirmed; the sweep exists so staff-facing pending lists do not show
//! requests that silently timed out.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::loyalty::redemption::RedemptionEngine;

/// Spawn the periodic expiry sweep. Idempotent per tick; safe to run on
/// multiple instances concurrently.
pub fn spawn_expiry_sweep(
    engine: RedemptionEngine,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Expiry sweep stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match engine.expire_stale().await {
                        Ok(0) => {}
                        Ok(n) => tracing::info!(expired = n, "Expired stale redemption requests"),
                        Err(e) => tracing::warn!(error = %e, "Expiry sweep failed"),
                    }
                }
            }
        }
    })
}
