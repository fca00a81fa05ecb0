use crate::errors::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const USER_HEADER: &str = "x-user-id";

/// Identity of the signed-in student, as asserted by the fronting auth layer.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CurrentUser(value.to_string()))
            .ok_or_else(|| AppError::unauthorized("sign in required"))
    }
}
