use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::JsonBody;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

// POST /api/auth/register
#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    username: String,
    #[validate(email)]
    email: String,
    #[validate(length(min = 6))]
    password: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let (user, token) = state.auth.register(req.username, req.email, req.password).await?;

    Ok((StatusCode::CREATED, Json(json!({ "user": user, "token": token }))))
}

// POST /api/auth/login
#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user, token) = state.auth.login(&req.email, req.password).await?;

    Ok((StatusCode::OK, Json(json!({ "user": user, "token": token }))))
}
