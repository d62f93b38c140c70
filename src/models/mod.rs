pub mod user;
pub mod seat;
pub mod booking;

pub use user::{NewUser, User, UserId};
pub use seat::{group_by_row, RowAvailability, Seat, SeatId, SeatLayout, SeatLocation};
pub use booking::{Booking, BookingId, BookingReceipt, BookingRecord, BookingStatus};
