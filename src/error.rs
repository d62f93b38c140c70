use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::SeatId;

/// Failures of the booking core. Every failure leaves seats and bookings
/// exactly as they were before the operation started.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not enough seats available: requested {requested}, free {available}")]
    NotEnoughSeats { requested: usize, available: usize },

    /// Missing booking and someone else's booking look the same to the caller.
    #[error("booking not found or unauthorized")]
    NotFoundOrUnauthorized,

    #[error("booking is already cancelled")]
    AlreadyCancelled,

    /// Integrity guard tripped: a chosen seat was booked by someone else.
    #[error("seat {0} is already booked")]
    SeatAlreadyBooked(SeatId),

    /// The store aborted the transaction (serialization failure or deadlock).
    #[error("transaction aborted by a concurrent writer")]
    Conflict,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] sqlx::Error),
}

impl BookingError {
    /// Whether a fresh attempt from a new snapshot may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingError::Conflict | BookingError::SeatAlreadyBooked(_))
    }
}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // serialization_failure, deadlock_detected
            if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
                return BookingError::Conflict;
            }
        }
        BookingError::StoreUnavailable(err)
    }
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("authentication required")]
    Unauthorized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user already exists")]
    UserExists,

    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Booking(err) => match err {
                BookingError::InvalidRequest(_) | BookingError::NotEnoughSeats { .. } => {
                    StatusCode::BAD_REQUEST
                }
                BookingError::NotFoundOrUnauthorized => StatusCode::NOT_FOUND,
                BookingError::AlreadyCancelled => StatusCode::CONFLICT,
                BookingError::SeatAlreadyBooked(_) => StatusCode::INTERNAL_SERVER_ERROR,
                BookingError::Conflict | BookingError::StoreUnavailable(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            },
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::UserExists => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ApiError::Booking(BookingError::SeatAlreadyBooked(_)) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
            ApiError::Booking(BookingError::Conflict | BookingError::StoreUnavailable(_)) => {
                "Service temporarily unavailable, please retry".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors.to_string())
    }
}

// Malformed or mistyped request bodies are client errors like any other.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}
