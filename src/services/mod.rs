pub mod allocation;
pub mod auth;
pub mod booking;

pub use auth::AuthService;
pub use booking::BookingService;
