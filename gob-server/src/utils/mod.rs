//! Utility module — logging and error re-exports

pub mod logger;

// Re-export error types from shared so handlers can use `crate::utils::AppError`
pub use shared::error::{ApiResponse, AppError, AppResult, ok};
