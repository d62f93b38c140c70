//! In-process store with the same transactional contract as [`super::PgStore`].
//!
//! Transactions are serialized by one mutex. A transaction works on a copy of
//! the tables and swaps it in on commit, so an abandoned transaction leaves
//! nothing behind.
//!
//! The [`BookingStore`] reads take the same mutex, so calling them while
//! holding a [`MemoryTransaction`] on the same task deadlocks.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingStore, StoreTransaction};
use crate::error::BookingError;
use crate::models::{
    group_by_row, Booking, BookingId, BookingRecord, BookingStatus, NewUser, RowAvailability, Seat,
    SeatId, SeatLayout, SeatLocation, User, UserId,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    seats: BTreeMap<SeatId, Seat>,
    bookings: BTreeMap<BookingId, BookingRecord>,
    booking_details: Vec<(BookingId, SeatId)>,
    users: BTreeMap<UserId, User>,
    next_seat_id: i64,
    next_booking_id: i64,
    next_user_id: i64,
}

impl Tables {
    fn seats_of(&self, booking_id: BookingId) -> Vec<SeatLocation> {
        let mut seats: Vec<SeatLocation> = self
            .booking_details
            .iter()
            .filter(|(owner, _)| *owner == booking_id)
            .filter_map(|(_, seat_id)| self.seats.get(seat_id).map(Seat::location))
            .collect();
        seats.sort_by_key(SeatLocation::sort_key);
        seats
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `layout`.
    pub async fn with_layout(layout: &SeatLayout) -> Self {
        let store = Self::new();
        store.seed(layout).await;
        store
    }

    async fn seed(&self, layout: &SeatLayout) -> u64 {
        let mut tables = self.tables.lock().await;
        if !tables.seats.is_empty() {
            return 0;
        }
        for (row_number, seat_number) in layout.positions() {
            tables.next_seat_id += 1;
            let id = SeatId(tables.next_seat_id);
            tables.seats.insert(
                id,
                Seat {
                    id,
                    row_number,
                    seat_number,
                    is_booked: false,
                },
            );
        }
        tables.seats.len() as u64
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, BookingError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn provision(&self, layout: &SeatLayout) -> Result<u64, BookingError> {
        Ok(self.seed(layout).await)
    }

    async fn list_seats(&self) -> Result<Vec<Seat>, BookingError> {
        let tables = self.tables.lock().await;
        let mut seats: Vec<Seat> = tables.seats.values().cloned().collect();
        seats.sort_by_key(|seat| (seat.row_number, seat.seat_number));
        Ok(seats)
    }

    async fn list_free_seats(&self) -> Result<Vec<SeatLocation>, BookingError> {
        let tables = self.tables.lock().await;
        let mut seats: Vec<SeatLocation> = tables
            .seats
            .values()
            .filter(|seat| !seat.is_booked)
            .map(Seat::location)
            .collect();
        seats.sort_by_key(SeatLocation::sort_key);
        Ok(seats)
    }

    async fn list_active_bookings(&self, user_id: UserId) -> Result<Vec<Booking>, BookingError> {
        let tables = self.tables.lock().await;
        let mut records: Vec<&BookingRecord> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id && b.status == BookingStatus::Active)
            .collect();
        records.sort_by(|a, b| b.booking_time.cmp(&a.booking_time).then(b.id.cmp(&a.id)));

        Ok(records
            .into_iter()
            .map(|record| Booking {
                id: record.id,
                booking_time: record.booking_time,
                status: record.status,
                seats: tables.seats_of(record.id),
            })
            .collect())
    }

    async fn list_booked_seat_numbers(&self) -> Result<Vec<i32>, BookingError> {
        let tables = self.tables.lock().await;
        let mut numbers: Vec<i32> = tables
            .booking_details
            .iter()
            .filter(|(booking_id, _)| {
                tables
                    .bookings
                    .get(booking_id)
                    .is_some_and(|b| b.status == BookingStatus::Active)
            })
            .filter_map(|(_, seat_id)| tables.seats.get(seat_id).map(|seat| seat.seat_number))
            .collect();
        numbers.sort_unstable();
        numbers.dedup();
        Ok(numbers)
    }

    async fn create_user(&self, user: NewUser) -> Result<Option<User>, BookingError> {
        let mut tables = self.tables.lock().await;
        let taken = tables
            .users
            .values()
            .any(|u| u.email == user.email || u.username == user.username);
        if taken {
            return Ok(None);
        }

        tables.next_user_id += 1;
        let created = User {
            id: UserId(tables.next_user_id),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(Some(created))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, BookingError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn snapshot_free(&mut self) -> Result<Vec<RowAvailability>, BookingError> {
        let free = self
            .working
            .seats
            .values()
            .filter(|seat| !seat.is_booked)
            .map(Seat::location)
            .collect();
        Ok(group_by_row(free))
    }

    async fn mark_booked(&mut self, seat_ids: &[SeatId]) -> Result<(), BookingError> {
        let mut seen = Vec::with_capacity(seat_ids.len());
        for id in seat_ids {
            let free = self.working.seats.get(id).is_some_and(|seat| !seat.is_booked);
            if !free || seen.contains(id) {
                return Err(BookingError::SeatAlreadyBooked(*id));
            }
            seen.push(*id);
        }
        for id in seat_ids {
            if let Some(seat) = self.working.seats.get_mut(id) {
                seat.is_booked = true;
            }
        }
        Ok(())
    }

    async fn mark_free(&mut self, seat_ids: &[SeatId]) -> Result<(), BookingError> {
        for id in seat_ids {
            if let Some(seat) = self.working.seats.get_mut(id) {
                seat.is_booked = false;
            }
        }
        Ok(())
    }

    async fn insert_booking(&mut self, user_id: UserId) -> Result<BookingRecord, BookingError> {
        self.working.next_booking_id += 1;
        let record = BookingRecord {
            id: BookingId(self.working.next_booking_id),
            user_id,
            booking_time: Utc::now(),
            status: BookingStatus::Active,
        };
        self.working.bookings.insert(record.id, record.clone());
        Ok(record)
    }

    async fn attach_seats(&mut self, booking_id: BookingId, seat_ids: &[SeatId]) -> Result<(), BookingError> {
        self.working
            .booking_details
            .extend(seat_ids.iter().map(|seat_id| (booking_id, *seat_id)));
        Ok(())
    }

    async fn lock_owned_booking(
        &mut self,
        booking_id: BookingId,
        user_id: UserId,
    ) -> Result<Option<BookingRecord>, BookingError> {
        Ok(self
            .working
            .bookings
            .get(&booking_id)
            .filter(|b| b.user_id == user_id)
            .cloned())
    }

    async fn booking_seats(&mut self, booking_id: BookingId) -> Result<Vec<SeatLocation>, BookingError> {
        Ok(self.working.seats_of(booking_id))
    }

    async fn mark_cancelled(&mut self, booking_id: BookingId) -> Result<(), BookingError> {
        if let Some(booking) = self.working.bookings.get_mut(&booking_id) {
            booking.status = BookingStatus::Cancelled;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BookingError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
