//! booking.rs
//!
//! Creates and cancels bookings. Each attempt runs in one store transaction:
//!
//! `Start -> SeatsSnapshotted -> SeatsChosen -> LedgerWritten -> SeatsMarked -> Committed`
//!
//! Any failure drops the transaction, which rolls every write back. Attempts
//! that fail with a retryable error start over from a fresh snapshot, up to
//! `max_attempts` in total.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::BookingConfig;
use crate::error::BookingError;
use crate::models::{Booking, BookingId, BookingReceipt, BookingStatus, Seat, SeatId, SeatLocation, UserId};
use crate::services::allocation;
use crate::store::BookingStore;

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn BookingStore>,
    max_seats_per_booking: u32,
    max_attempts: u32,
}

impl BookingService {
    pub fn new(store: Arc<dyn BookingStore>, config: &BookingConfig) -> Self {
        Self {
            store,
            max_seats_per_booking: config.max_seats_per_booking,
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub fn max_seats_per_booking(&self) -> u32 {
        self.max_seats_per_booking
    }

    pub async fn create_booking(&self, user_id: UserId, requested: u32) -> Result<BookingReceipt, BookingError> {
        if requested == 0 || requested > self.max_seats_per_booking {
            return Err(BookingError::InvalidRequest(format!(
                "please select between 1 and {} seats",
                self.max_seats_per_booking
            )));
        }

        let mut attempt = 1;
        loop {
            match self.try_create_booking(user_id, requested as usize).await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "create_booking for user {} aborted on attempt {}/{}: {}",
                        user_id, attempt, self.max_attempts, err
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_create_booking(&self, user_id: UserId, requested: usize) -> Result<BookingReceipt, BookingError> {
        let mut tx = self.store.begin().await?;

        let rows = tx.snapshot_free().await?;
        debug!("user {}: snapshot holds {} rows with free seats", user_id, rows.len());

        let allocation = allocation::allocate(&rows, requested)?;
        debug!("user {}: chose {} seats via {:?}", user_id, requested, allocation.strategy);

        let seat_ids = allocation.seat_ids();
        let record = tx.insert_booking(user_id).await?;
        tx.attach_seats(record.id, &seat_ids).await?;
        debug!("user {}: booking {} written to ledger", user_id, record.id);

        if let Err(err) = tx.mark_booked(&seat_ids).await {
            if let BookingError::SeatAlreadyBooked(seat_id) = &err {
                error!(
                    "integrity check failed: seat {} was free in the snapshot of booking {} but is booked",
                    seat_id, record.id
                );
            }
            return Err(err);
        }

        tx.commit().await?;
        info!(
            "Booking {} created for user {}: seats {:?}",
            record.id,
            user_id,
            allocation.seats.iter().map(|s| s.seat_number).collect::<Vec<_>>()
        );

        Ok(BookingReceipt {
            booking_id: record.id,
            booking_time: record.booking_time,
            seats: allocation.seats,
        })
    }

    /// Cancels a booking owned by `user_id` and frees its seats.
    pub async fn cancel_booking(&self, user_id: UserId, booking_id: BookingId) -> Result<Vec<SeatLocation>, BookingError> {
        let mut attempt = 1;
        loop {
            match self.try_cancel_booking(user_id, booking_id).await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "cancel_booking {} aborted on attempt {}/{}: {}",
                        booking_id, attempt, self.max_attempts, err
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_cancel_booking(&self, user_id: UserId, booking_id: BookingId) -> Result<Vec<SeatLocation>, BookingError> {
        let mut tx = self.store.begin().await?;

        let record = tx
            .lock_owned_booking(booking_id, user_id)
            .await?
            .ok_or(BookingError::NotFoundOrUnauthorized)?;
        if record.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled);
        }

        let seats = tx.booking_seats(booking_id).await?;
        let seat_ids: Vec<SeatId> = seats.iter().map(|s| s.id).collect();

        tx.mark_cancelled(booking_id).await?;
        tx.mark_free(&seat_ids).await?;
        tx.commit().await?;

        info!("Booking {} cancelled by user {}, {} seats released", booking_id, user_id, seats.len());
        Ok(seats)
    }

    pub async fn list_free_seats(&self) -> Result<Vec<SeatLocation>, BookingError> {
        self.store.list_free_seats().await
    }

    pub async fn list_seats(&self) -> Result<Vec<Seat>, BookingError> {
        self.store.list_seats().await
    }

    pub async fn list_user_bookings(&self, user_id: UserId) -> Result<Vec<Booking>, BookingError> {
        self.store.list_active_bookings(user_id).await
    }

    pub async fn list_booked_seat_numbers(&self) -> Result<Vec<i32>, BookingError> {
        self.store.list_booked_seat_numbers().await
    }
}
