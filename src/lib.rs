pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::config::{Config, StoreKind};
use crate::database::Database;
use crate::services::{AuthService, BookingService};
use crate::store::{BookingStore, MemoryStore, PgStore};

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub bookings: BookingService,
    pub auth: AuthService,
}

impl AppState {
    /// Opens the configured store, migrates and provisions it.
    pub async fn connect(config: Config) -> anyhow::Result<Arc<Self>> {
        let store: Arc<dyn BookingStore> = match config.app.store {
            StoreKind::Postgres => {
                let db = Database::connect(&config.database).await?;
                db.run_migrations().await?;
                Arc::new(PgStore::new(db))
            }
            StoreKind::Memory => {
                info!("Using in-memory store, bookings will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let inserted = store.provision(&config.inventory.layout).await?;
        info!(
            "Seat inventory ready: {} seats configured, {} newly provisioned",
            config.inventory.layout.total_seats(),
            inserted
        );

        Ok(Self::with_store(&config, store))
    }

    pub fn with_store(config: &Config, store: Arc<dyn BookingStore>) -> Arc<Self> {
        Arc::new(Self {
            bookings: BookingService::new(store.clone(), &config.booking),
            auth: AuthService::new(store, &config.jwt),
        })
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Seat Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
