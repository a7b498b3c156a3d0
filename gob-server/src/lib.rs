//! gob-server — multi-tenant loyalty rewards service
//!
//! The core of the crate is the redemption lifecycle and points-ledger
//! consistency engine: merchants enroll members, award points, and let
//! members redeem points for rewards (including on-chain USDC payouts)
//! through a time-boxed, staff-verified redemption flow.

pub mod api;
pub mod core;
pub mod db;
pub mod loyalty;
pub mod utils;

pub use crate::core::{Config, Server, ServerState};
pub use crate::utils::{AppError, AppResult};
