use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment};
use serde::Deserialize;

use crate::models::SeatLayout;

// Main configuration, one section per concern
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub inventory: InventoryConfig,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub store: StoreKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

// Only needed by the postgres store
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_in_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    pub layout: SeatLayout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    pub max_seats_per_booking: u32,
    /// Total attempts per operation when the store aborts a transaction.
    pub max_attempts: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            max_seats_per_booking: 7,
            max_attempts: 3,
        }
    }
}

impl Config {
    /// Defaults overlaid with the process environment (`PORT`, `DATABASE_URL`, ...).
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self::defaults()?.add_source(Environment::default()).build()?;
        Self::from_settings(&settings)
    }

    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001)?
            .set_default("environment", "development")?
            .set_default("rust_log", "seat_booking=debug,tower_http=debug")?
            .set_default("store", "postgres")?
            .set_default("db_pool_size", 20)?
            .set_default("jwt_expires_in_hours", 24)?
            .set_default("bcrypt_cost", 10)?
            .set_default("total_seats", 80)?
            .set_default("seats_per_row", 7)?
            .set_default("max_seats_per_booking", 7)?
            .set_default("booking_max_attempts", 3)
    }

    pub fn from_settings(settings: &config::Config) -> Result<Self, ConfigError> {
        let store = match settings.get_string("store")?.to_lowercase().as_str() {
            "postgres" => StoreKind::Postgres,
            "memory" => StoreKind::Memory,
            other => {
                return Err(ConfigError::Message(format!(
                    "STORE must be postgres or memory, got {other}"
                )))
            }
        };

        let layout = match optional_string(settings, "seat_layout")? {
            Some(raw) => parse_layout(&raw)?,
            None => SeatLayout::uniform(settings.get("total_seats")?, settings.get("seats_per_row")?),
        };
        if layout.total_seats() == 0 {
            return Err(ConfigError::Message("seat inventory must not be empty".to_string()));
        }

        Ok(Config {
            app: AppConfig {
                host: settings.get_string("host")?,
                port: settings.get("port")?,
                environment: settings.get_string("environment")?,
                rust_log: settings.get_string("rust_log")?,
                store,
            },
            database: DatabaseConfig {
                url: optional_string(settings, "database_url")?,
                pool_size: settings.get("db_pool_size")?,
            },
            jwt: JwtConfig {
                secret: settings.get_string("jwt_secret")?,
                expires_in_hours: settings.get("jwt_expires_in_hours")?,
                bcrypt_cost: settings.get("bcrypt_cost")?,
            },
            inventory: InventoryConfig { layout },
            booking: BookingConfig {
                max_seats_per_booking: settings.get("max_seats_per_booking")?,
                max_attempts: settings.get("booking_max_attempts")?,
            },
        })
    }
}

fn optional_string(settings: &config::Config, key: &str) -> Result<Option<String>, ConfigError> {
    match settings.get_string(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Parses per-row seat counts such as `7,7,3`.
fn parse_layout(raw: &str) -> Result<SeatLayout, ConfigError> {
    let rows = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::Message(format!("SEAT_LAYOUT has an invalid row size: {part:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SeatLayout::from_rows(rows))
}
