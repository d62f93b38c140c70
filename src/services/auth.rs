//! auth.rs
//!
//! Registration, login and bearer tokens. Booking code only ever sees the
//! resulting [`UserId`].

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::models::{NewUser, User, UserId};
use crate::store::BookingStore;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn BookingStore>,
    secret: String,
    expires_in_hours: i64,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(store: Arc<dyn BookingStore>, config: &JwtConfig) -> Self {
        Self {
            store,
            secret: config.secret.clone(),
            expires_in_hours: config.expires_in_hours,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    pub async fn register(&self, username: String, email: String, password: String) -> Result<(User, String), ApiError> {
        let password_hash = self.hash_password(password).await?;
        let user = self
            .store
            .create_user(NewUser { username, email, password_hash })
            .await?
            .ok_or(ApiError::UserExists)?;

        info!("Registered user {} ({})", user.id, user.username);
        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    /// Unknown email and wrong password fail the same way.
    pub async fn login(&self, email: &str, password: String) -> Result<(User, String), ApiError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !verify_password(password, user.password_hash.clone()).await? {
            return Err(ApiError::InvalidCredentials);
        }

        let token = self.issue_token(user.id)?;
        Ok((user, token))
    }

    pub fn issue_token(&self, user_id: UserId) -> Result<String, ApiError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (Utc::now() + Duration::hours(self.expires_in_hours)).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| ApiError::Internal(format!("token encoding failed: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> Result<UserId, ApiError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::Unauthorized)?;

        data.claims
            .sub
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| ApiError::Unauthorized)
    }

    async fn hash_password(&self, password: String) -> Result<String, ApiError> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| ApiError::Internal(format!("password hashing task failed: {e}")))?
            .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))
    }
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("password check task failed: {e}")))?
        .or(Ok(false))
}
