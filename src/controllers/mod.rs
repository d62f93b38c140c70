pub mod auth;
pub mod bookings;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/bookings", bookings::routes())
}
