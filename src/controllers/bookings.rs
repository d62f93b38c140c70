use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{ApiError, BookingError};
use crate::middleware::{AuthUser, JsonBody};
use crate::models::BookingId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_booking))
        .route("/user", get(get_user_bookings))
        .route("/seats", get(get_seat_map))
        .route("/seats/available", get(get_available_seats))
        .route("/seats/booked", get(get_booked_seats))
        .route("/{id}", delete(cancel_booking))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    number_of_seats: Option<i64>,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    JsonBody(req): JsonBody<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let max = state.bookings.max_seats_per_booking();
    let requested = req
        .number_of_seats
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| (1..=max).contains(n))
        .ok_or_else(|| BookingError::InvalidRequest(format!("please select between 1 and {max} seats")))?;

    let receipt = state.bookings.create_booking(user.user_id, requested).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Booking successful",
            "data": receipt,
        })),
    ))
}

// GET /api/bookings/user
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let bookings = state.bookings.list_user_bookings(user.user_id).await?;
    Ok(Json(json!({ "success": true, "data": bookings })))
}

// DELETE /api/bookings/{id}
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let released = state.bookings.cancel_booking(user.user_id, BookingId(id)).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Booking cancelled",
        "data": { "releasedSeats": released },
    })))
}

/* ---------- SEATS ---------- */

// GET /api/bookings/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let seats = state.bookings.list_seats().await?;
    Ok(Json(json!({ "success": true, "data": seats })))
}

// GET /api/bookings/seats/available
async fn get_available_seats(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let seats = state.bookings.list_free_seats().await?;
    Ok(Json(json!({ "success": true, "data": seats })))
}

// GET /api/bookings/seats/booked
async fn get_booked_seats(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let numbers = state.bookings.list_booked_seat_numbers().await?;
    Ok(Json(json!({ "success": true, "data": numbers })))
}
