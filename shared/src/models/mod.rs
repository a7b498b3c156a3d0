//! Data models shared across crates
//!
//! All tables are keyed by snowflake-style i64 IDs; timestamps are i64 UTC
//! milliseconds. Enum columns are stored as SCREAMING_SNAKE_CASE text.

pub mod business_member;
pub mod member;
pub mod merchant;
pub mod merchant_member;
pub mod redemption;
pub mod reward;
pub mod transaction;

pub use business_member::BusinessMember;
pub use member::{Member, MemberCreate};
pub use merchant::{Merchant, MerchantCreate, Plan};
pub use merchant_member::{MemberBalance, MerchantMember, Tier};
pub use redemption::{
    ConfirmRedemptionResponse, CreateRedemptionResponse, RedemptionRequest, RedemptionStatus,
    RedemptionStatusResponse, VerifyRedemptionResponse,
};
pub use reward::{Reward, RewardCreate, RewardType, RewardView};
pub use transaction::{
    NewTransaction, PayoutOutcome, RewardTransaction, TransactionKind, TransactionStatus,
};
