//! Shared types for the gob loyalty platform
//!
//! Common types used across crates: data models, error types, response
//! structures, and small utilities (timestamps, ID generation).

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult};
