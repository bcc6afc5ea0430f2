pub mod events;
pub mod payment;
pub mod repository;
pub mod slot;

pub use events::{EventPublisher, LogPublisher, PublishError};
pub use repository::{AvailabilityRepository, BookingRepository, StoreError, StoreResult, TourRepository};
pub use slot::SlotKey;
