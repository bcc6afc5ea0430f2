pub mod app_config;
pub mod availability_repo;
pub mod booking_repo;
pub mod database;
#[cfg(feature = "kafka")]
pub mod events;
pub mod memory;
pub mod redis_repo;
pub mod tour_repo;

use std::sync::Arc;

use riptide_core::{AvailabilityRepository, BookingRepository, EventPublisher, LogPublisher, TourRepository};
use thiserror::Error;
use tracing::{info, warn};

pub use app_config::{Config, StoreMode};
pub use availability_repo::StoreAvailabilityRepository;
pub use booking_repo::StoreBookingRepository;
pub use database::DbClient;
#[cfg(feature = "kafka")]
pub use events::EventProducer;
pub use memory::MemoryStore;
pub use redis_repo::RedisClient;
pub use tour_repo::StoreTourRepository;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("redis client setup failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Everything the service layer needs from the storage tier.
#[derive(Clone)]
pub struct Repositories {
    pub tours: Arc<dyn TourRepository>,
    pub availability: Arc<dyn AvailabilityRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub publisher: Arc<dyn EventPublisher>,
    pub redis: Option<RedisClient>,
    pub db: Option<DbClient>,
}

impl Repositories {
    /// Memory-backed repositories with log-only event publishing.
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            tours: store.clone(),
            availability: store.clone(),
            bookings: store,
            publisher: Arc::new(LogPublisher),
            redis: None,
            db: None,
        }
    }
}

pub async fn bootstrap(config: &Config) -> Result<Repositories, BootstrapError> {
    let mut repos = match config.booking.store {
        StoreMode::Memory => {
            info!("Using in-memory store");
            Repositories::in_memory()
        }
        StoreMode::Postgres => {
            info!("Initializing PostgreSQL connection...");
            let db = DbClient::connect(&config.database).await?;
            db.migrate().await?;

            Repositories {
                tours: Arc::new(StoreTourRepository::new(db.pool.clone())),
                availability: Arc::new(StoreAvailabilityRepository::new(db.pool.clone())),
                bookings: Arc::new(StoreBookingRepository::new(db.pool.clone())),
                publisher: Arc::new(LogPublisher),
                redis: None,
                db: Some(db),
            }
        }
    };

    if let Some(redis) = &config.redis {
        repos.redis = Some(RedisClient::new(&redis.url)?);
        info!("Redis rate limiting enabled");
    }

    if let Some(kafka) = &config.kafka {
        repos.publisher = kafka_publisher(&kafka.brokers);
    }

    Ok(repos)
}

#[cfg(feature = "kafka")]
fn kafka_publisher(brokers: &str) -> Arc<dyn EventPublisher> {
    match EventProducer::new(brokers) {
        Ok(producer) => {
            info!(brokers, "Publishing booking events to Kafka");
            Arc::new(producer)
        }
        Err(e) => {
            warn!("Kafka producer unavailable ({}), falling back to log publisher", e);
            Arc::new(LogPublisher)
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn kafka_publisher(brokers: &str) -> Arc<dyn EventPublisher> {
    warn!(brokers, "Kafka configured but the `kafka` feature is disabled; using log publisher");
    Arc::new(LogPublisher)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 0

                [database]
                url = "postgres://unused"

                [auth]
                jwt_secret = "secret"
                jwt_expiration_seconds = 60

                [booking]
                store = "memory"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_memory_mode_skips_database() {
        let repos = bootstrap(&memory_config()).await.unwrap();
        assert!(repos.db.is_none());
        assert!(repos.redis.is_none());
        assert!(repos.tours.list_tours(false).await.unwrap().is_empty());
    }
}
