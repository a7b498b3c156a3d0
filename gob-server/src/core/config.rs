/// Server configuration
///
/// # Environment variables
///
/// Every setting can be overridden through environment variables:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | GOB_DB_PATH | gob.db | SQLite database file path |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | development \| staging \| production |
/// | PAYOUT_PROVIDER | none | none \| mock (on-chain transfer backend) |
/// | EXPIRY_SWEEP_INTERVAL_SECS | 60 | Stale-redemption sweep cadence |
///
/// # Example
///
/// ```ignore
/// GOB_DB_PATH=/data/gob/gob.db HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file path
    pub db_path: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,
    /// Payout transfer backend selector.
    ///
    /// The actual on-chain transfer lives behind the `PayoutProvider` seam;
    /// `none` records every transfer as failed for manual remediation, `mock`
    /// simulates success (local development).
    pub payout_provider: String,
    /// How often the background task expires stale pending redemptions.
    ///
    /// Correctness never depends on this sweep (verify/confirm re-check
    /// expiry); it only keeps staff-facing pending lists fresh.
    pub expiry_sweep_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("GOB_DB_PATH").unwrap_or_else(|_| "gob.db".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            payout_provider: std::env::var("PAYOUT_PROVIDER").unwrap_or_else(|_| "none".into()),
            expiry_sweep_interval_secs: std::env::var("EXPIRY_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}
