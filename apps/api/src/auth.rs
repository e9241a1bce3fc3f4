use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::errors::AppError;

/// Header carrying the verified user id, set by the upstream auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller. Rejects with `Unauthenticated` when the header is
/// absent or not a usable id.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub user_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| is_valid_user_id(id))
            .ok_or(AppError::Unauthenticated)?;

        Ok(CallerIdentity {
            user_id: user_id.to_string(),
        })
    }
}

/// User ids become part of collection paths, so separators are refused.
fn is_valid_user_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 128 && !id.contains('/')
}
