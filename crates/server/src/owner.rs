use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

pub const OWNER_HEADER: &str = "x-user-id";

/// Caller identity, set by the authenticating gateway in front of this
/// service. Every job route requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;

        Ok(Owner(owner.to_string()))
    }
}
