//! Identity extractors
//!
//! The session/identity resolver is an external collaborator: the gateway
//! terminates cookies/JWTs and forwards the resolved identity in trusted
//! headers on the private network. Handlers declare which identity they need
//! by taking one of these extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::utils::AppError;

const MEMBER_HEADER: &str = "x-member-id";
const MERCHANT_HEADER: &str = "x-merchant-id";
const STAFF_HEADER: &str = "x-staff-id";

/// A member session (customer-facing endpoints).
#[derive(Debug, Clone)]
pub struct CurrentMember {
    pub member_id: i64,
}

/// A merchant staff session (staff-facing endpoints).
#[derive(Debug, Clone)]
pub struct CurrentStaff {
    pub merchant_id: i64,
    pub staff_id: Option<i64>,
}

fn header_id(parts: &Parts, name: &str) -> Option<i64> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentMember {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        header_id(parts, MEMBER_HEADER)
            .map(|member_id| CurrentMember { member_id })
            .ok_or(AppError::Unauthorized)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentStaff {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let merchant_id = header_id(parts, MERCHANT_HEADER).ok_or(AppError::Unauthorized)?;
        Ok(CurrentStaff {
            merchant_id,
            staff_id: header_id(parts, STAFF_HEADER),
        })
    }
}
