//! Loyalty core — points ledger, reward catalog gate, redemption state
//! machine, and payout coordination.
//!
//! Everything here is storage-backed and safe under concurrent callers: the
//! per-(merchant, member) balance and per-request status are only ever
//! mutated through guarded single-statement UPDATEs, and the confirm path
//! runs inside one transaction so a debit and its status transition land
//! together or not at all.

pub mod catalog;
pub mod ledger;
pub mod payout;
pub mod redemption;

use thiserror::Error;

use crate::db::repository::RepoError;
use shared::AppError;

/// Error taxonomy for the loyalty core.
///
/// Validation errors are recovered at the call boundary and returned as typed
/// failures; storage errors propagate as `Repo`. A failed payout is never an
/// error here — it is recorded on the PAYOUT transaction row and surfaced as
/// a nested outcome, because the points were legitimately spent.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("redemption token belongs to another merchant")]
    WrongMerchant,

    #[error("redemption already confirmed")]
    AlreadyConfirmed,

    #[error("redemption already declined")]
    AlreadyDeclined,

    #[error("redemption was cancelled by the member")]
    AlreadyCancelled,

    #[error("redemption request has expired")]
    Expired,

    #[error("insufficient points: have {have}, need {need}")]
    InsufficientPoints { have: i64, need: i64 },

    #[error("insufficient balance for debit")]
    InsufficientBalance,

    #[error("reward is not redeemable on the current plan")]
    PlanRestricted,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

impl From<LoyaltyError> for AppError {
    fn from(err: LoyaltyError) -> Self {
        match err {
            LoyaltyError::NotFound(what) => AppError::NotFound(what.to_string()),
            LoyaltyError::WrongMerchant => AppError::Forbidden(err.to_string()),
            LoyaltyError::AlreadyConfirmed
            | LoyaltyError::AlreadyDeclined
            | LoyaltyError::AlreadyCancelled
            | LoyaltyError::Expired => AppError::Conflict(err.to_string()),
            LoyaltyError::InsufficientPoints { .. }
            | LoyaltyError::InsufficientBalance
            | LoyaltyError::PlanRestricted => AppError::BusinessRule(err.to_string()),
            LoyaltyError::Validation(msg) => AppError::Validation(msg),
            LoyaltyError::Repo(RepoError::NotFound(msg)) => AppError::NotFound(msg),
            LoyaltyError::Repo(RepoError::Duplicate(msg)) => AppError::Conflict(msg),
            LoyaltyError::Repo(RepoError::Validation(msg)) => AppError::Validation(msg),
            LoyaltyError::Repo(RepoError::Database(msg)) => AppError::Database(msg),
        }
    }
}
