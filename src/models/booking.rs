use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use super::{SeatLocation, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct BookingId(pub i64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a booking. The only transition is `Active -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

/// A row of the booking ledger.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct BookingRecord {
    pub id: BookingId,
    pub user_id: UserId,
    pub booking_time: DateTime<Utc>,
    pub status: BookingStatus,
}

/// A booking as listed to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub booking_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub seats: Vec<SeatLocation>,
}

/// Result of a successful booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub booking_id: BookingId,
    pub booking_time: DateTime<Utc>,
    pub seats: Vec<SeatLocation>,
}
