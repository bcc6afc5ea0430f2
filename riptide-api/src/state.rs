use std::sync::Arc;

use riptide_booking::{BookingLedger, PaymentOrchestrator, ReservationCoordinator};
use riptide_catalog::{AvailabilityLedger, TourCatalog};
use riptide_core::payment::PaymentAdapter;
use riptide_store::app_config::BookingRules;
use riptide_store::{RedisClient, Repositories};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: TourCatalog,
    pub availability: AvailabilityLedger,
    pub coordinator: ReservationCoordinator,
    pub payments: Arc<PaymentOrchestrator>,
    pub redis: Option<RedisClient>,
    pub auth: AuthConfig,
    pub rate_limit_per_minute: i64,
}

impl AppState {
    /// Wire the services over one set of repositories
    pub fn new(
        repos: &Repositories,
        adapter: Arc<dyn PaymentAdapter>,
        auth: AuthConfig,
        rules: &BookingRules,
    ) -> Self {
        let catalog = TourCatalog::new(repos.tours.clone());
        let availability =
            AvailabilityLedger::new(catalog.clone(), repos.availability.clone(), repos.bookings.clone());
        let ledger = BookingLedger::new(repos.bookings.clone());
        let coordinator = ReservationCoordinator::new(
            catalog.clone(),
            availability.clone(),
            ledger.clone(),
            repos.publisher.clone(),
        );
        let payments = Arc::new(PaymentOrchestrator::new(adapter, ledger, rules.currency.clone()));

        Self {
            catalog,
            availability,
            coordinator,
            payments,
            redis: repos.redis.clone(),
            auth,
            rate_limit_per_minute: rules.rate_limit_per_minute,
        }
    }

    pub fn ledger(&self) -> &BookingLedger {
        self.coordinator.ledger()
    }
}
