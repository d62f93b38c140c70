use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header, request::Parts},
};
use std::sync::Arc;

use crate::error::ApiError;
use crate::models::UserId;

/// The caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: UserId,
}

impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let user_id = state.auth.verify_token(token)?;
        Ok(AuthUser { user_id })
    }
}

/// `Json` body extractor whose rejections use the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
