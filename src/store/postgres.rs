use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use tracing::info;

use super::{BookingStore, StoreTransaction};
use crate::database::Database;
use crate::error::BookingError;
use crate::models::{
    group_by_row, Booking, BookingId, BookingRecord, BookingStatus, NewUser, RowAvailability, Seat,
    SeatId, SeatLayout, SeatLocation, User, UserId,
};

#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn raw_ids(seat_ids: &[SeatId]) -> Vec<i64> {
    seat_ids.iter().map(|id| id.0).collect()
}

#[async_trait]
impl BookingStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, BookingError> {
        let tx = self.db.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn provision(&self, layout: &SeatLayout) -> Result<u64, BookingError> {
        let mut tx = self.db.pool.begin().await?;

        // one provisioner at a time across workers
        sqlx::query("LOCK TABLE seats IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seats")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            info!("Seat inventory already provisioned ({} seats)", existing);
            return Ok(0);
        }

        let (rows, numbers): (Vec<i32>, Vec<i32>) = layout.positions().into_iter().unzip();
        let inserted = sqlx::query(
            r#"
            INSERT INTO seats (row_number, seat_number)
            SELECT * FROM UNNEST($1::int[], $2::int[])
            ON CONFLICT (seat_number) DO NOTHING
            "#,
        )
        .bind(rows)
        .bind(numbers)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        info!("Provisioned {} seats in {} rows", inserted, layout.rows().len());
        Ok(inserted)
    }

    async fn list_seats(&self) -> Result<Vec<Seat>, BookingError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, row_number, seat_number, is_booked
             FROM seats
             ORDER BY row_number, seat_number",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn list_free_seats(&self) -> Result<Vec<SeatLocation>, BookingError> {
        let seats = sqlx::query_as::<_, SeatLocation>(
            "SELECT id, row_number, seat_number
             FROM seats
             WHERE NOT is_booked
             ORDER BY row_number, seat_number",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(seats)
    }

    async fn list_active_bookings(&self, user_id: UserId) -> Result<Vec<Booking>, BookingError> {
        let rows = sqlx::query_as::<_, (i64, DateTime<Utc>, BookingStatus, i64, i32, i32)>(
            r#"
            SELECT b.id, b.booking_time, b.status, s.id, s.row_number, s.seat_number
            FROM bookings b
            JOIN booking_details bd ON bd.booking_id = b.id
            JOIN seats s ON s.id = bd.seat_id
            WHERE b.user_id = $1 AND b.status = 'active'
            ORDER BY b.booking_time DESC, b.id DESC, s.row_number, s.seat_number
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db.pool)
        .await?;

        // rows arrive grouped by booking, newest first
        let mut bookings: Vec<Booking> = Vec::new();
        for (booking_id, booking_time, status, seat_id, row_number, seat_number) in rows {
            let seat = SeatLocation {
                id: SeatId(seat_id),
                row_number,
                seat_number,
            };
            match bookings.last_mut() {
                Some(booking) if booking.id.0 == booking_id => booking.seats.push(seat),
                _ => bookings.push(Booking {
                    id: BookingId(booking_id),
                    booking_time,
                    status,
                    seats: vec![seat],
                }),
            }
        }
        Ok(bookings)
    }

    async fn list_booked_seat_numbers(&self) -> Result<Vec<i32>, BookingError> {
        let numbers = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT s.seat_number
            FROM seats s
            JOIN booking_details bd ON bd.seat_id = s.id
            JOIN bookings b ON b.id = bd.booking_id
            WHERE b.status = 'active'
            ORDER BY s.seat_number
            "#,
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(numbers)
    }

    async fn create_user(&self, user: NewUser) -> Result<Option<User>, BookingError> {
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash)
             VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING
             RETURNING id, username, email, password_hash, created_at",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, BookingError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(user)
    }
}

/// Rolls back when dropped without `commit`.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn snapshot_free(&mut self) -> Result<Vec<RowAvailability>, BookingError> {
        // Row locks are taken in (row, seat) order so concurrent bookers queue
        // up instead of deadlocking. A booker that waited re-checks the
        // predicate and skips seats taken meanwhile.
        let free = sqlx::query_as::<_, SeatLocation>(
            "SELECT id, row_number, seat_number
             FROM seats
             WHERE NOT is_booked
             ORDER BY row_number, seat_number
             FOR UPDATE",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(group_by_row(free))
    }

    async fn mark_booked(&mut self, seat_ids: &[SeatId]) -> Result<(), BookingError> {
        let updated: Vec<i64> = sqlx::query_scalar(
            "UPDATE seats SET is_booked = TRUE
             WHERE id = ANY($1) AND NOT is_booked
             RETURNING id",
        )
        .bind(raw_ids(seat_ids))
        .fetch_all(&mut *self.tx)
        .await?;

        if let Some(missing) = seat_ids.iter().find(|id| !updated.contains(&id.0)) {
            return Err(BookingError::SeatAlreadyBooked(*missing));
        }
        if updated.len() != seat_ids.len() {
            // duplicate ids in the request
            return Err(BookingError::SeatAlreadyBooked(seat_ids[0]));
        }
        Ok(())
    }

    async fn mark_free(&mut self, seat_ids: &[SeatId]) -> Result<(), BookingError> {
        sqlx::query("UPDATE seats SET is_booked = FALSE WHERE id = ANY($1)")
            .bind(raw_ids(seat_ids))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_booking(&mut self, user_id: UserId) -> Result<BookingRecord, BookingError> {
        let record = sqlx::query_as::<_, BookingRecord>(
            "INSERT INTO bookings (user_id, status)
             VALUES ($1, 'active')
             RETURNING id, user_id, booking_time, status",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn attach_seats(&mut self, booking_id: BookingId, seat_ids: &[SeatId]) -> Result<(), BookingError> {
        sqlx::query(
            "INSERT INTO booking_details (booking_id, seat_id)
             SELECT $1, UNNEST($2::bigint[])",
        )
        .bind(booking_id)
        .bind(raw_ids(seat_ids))
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_owned_booking(
        &mut self,
        booking_id: BookingId,
        user_id: UserId,
    ) -> Result<Option<BookingRecord>, BookingError> {
        let record = sqlx::query_as::<_, BookingRecord>(
            "SELECT id, user_id, booking_time, status
             FROM bookings
             WHERE id = $1 AND user_id = $2
             FOR UPDATE",
        )
        .bind(booking_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(record)
    }

    async fn booking_seats(&mut self, booking_id: BookingId) -> Result<Vec<SeatLocation>, BookingError> {
        let seats = sqlx::query_as::<_, SeatLocation>(
            "SELECT s.id, s.row_number, s.seat_number
             FROM booking_details bd
             JOIN seats s ON s.id = bd.seat_id
             WHERE bd.booking_id = $1
             ORDER BY s.row_number, s.seat_number",
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }

    async fn mark_cancelled(&mut self, booking_id: BookingId) -> Result<(), BookingError> {
        sqlx::query("UPDATE bookings SET status = 'cancelled' WHERE id = $1")
            .bind(booking_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), BookingError> {
        self.tx.commit().await?;
        Ok(())
    }
}
