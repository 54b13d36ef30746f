//! Acting-user identification.
//!
//! Every call that acts on behalf of a user carries the numeric user id
//! in the `X-Sharer-User-Id` header. The extractor only parses the
//! header; whether the user actually exists is checked per operation.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

pub const SHARER_USER_HEADER: &str = "X-Sharer-User-Id";

/// The user id carried in the `X-Sharer-User-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharerId(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for SharerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(SHARER_USER_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::validation("X-Sharer-User-Id header is required"))?;

        let id = raw.trim().parse::<i64>().map_err(|_| {
            ApiError::validation("X-Sharer-User-Id header must be a numeric user id")
        })?;

        Ok(SharerId(id))
    }
}
