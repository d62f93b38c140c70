//! Durable state of the service: seat inventory, booking ledger and users.
//!
//! Seats and bookings live in one consistency domain. Every mutation goes
//! through a [`StoreTransaction`] obtained from [`BookingStore::begin`]:
//! `commit` makes all its writes visible at once, and dropping the
//! transaction on any other path discards them.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::BookingError;
use crate::models::{
    Booking, BookingId, BookingRecord, NewUser, RowAvailability, Seat, SeatId, SeatLayout,
    SeatLocation, User, UserId,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    /// Opens an exclusive transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, BookingError>;

    /// Seeds the inventory from `layout` if the store has no seats yet.
    /// Returns how many seats were inserted.
    async fn provision(&self, layout: &SeatLayout) -> Result<u64, BookingError>;

    /// Every seat with its booked flag, ordered by (row, seat).
    async fn list_seats(&self) -> Result<Vec<Seat>, BookingError>;

    /// Free seats ordered by (row, seat).
    async fn list_free_seats(&self) -> Result<Vec<SeatLocation>, BookingError>;

    /// Active bookings of `user_id`, newest first, seats ordered by (row, seat).
    async fn list_active_bookings(&self, user_id: UserId) -> Result<Vec<Booking>, BookingError>;

    /// Distinct seat numbers held by active bookings, ascending.
    async fn list_booked_seat_numbers(&self) -> Result<Vec<i32>, BookingError>;

    /// Inserts a user; `None` when the email or username is taken.
    async fn create_user(&self, user: NewUser) -> Result<Option<User>, BookingError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, BookingError>;
}

/// Writes and locked reads inside one transaction.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Free seats grouped by row, as of this transaction. The seats stay
    /// reserved to this transaction until it ends.
    async fn snapshot_free(&mut self) -> Result<Vec<RowAvailability>, BookingError>;

    /// Flips seats to booked. Fails with [`BookingError::SeatAlreadyBooked`]
    /// if any of them is booked already.
    async fn mark_booked(&mut self, seat_ids: &[SeatId]) -> Result<(), BookingError>;

    async fn mark_free(&mut self, seat_ids: &[SeatId]) -> Result<(), BookingError>;

    /// Appends an active booking owned by `user_id`.
    async fn insert_booking(&mut self, user_id: UserId) -> Result<BookingRecord, BookingError>;

    async fn attach_seats(&mut self, booking_id: BookingId, seat_ids: &[SeatId]) -> Result<(), BookingError>;

    /// Loads and locks the booking if it exists and `user_id` owns it.
    async fn lock_owned_booking(
        &mut self,
        booking_id: BookingId,
        user_id: UserId,
    ) -> Result<Option<BookingRecord>, BookingError>;

    /// Seats attached to a booking, ordered by (row, seat).
    async fn booking_seats(&mut self, booking_id: BookingId) -> Result<Vec<SeatLocation>, BookingError>;

    async fn mark_cancelled(&mut self, booking_id: BookingId) -> Result<(), BookingError>;

    async fn commit(self: Box<Self>) -> Result<(), BookingError>;
}
