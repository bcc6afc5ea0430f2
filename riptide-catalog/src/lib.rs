pub mod availability;
pub mod pricing;
pub mod tour;

pub use availability::{AvailabilityError, AvailabilityLedger};
pub use pricing::{format_amount, total_amount, PricingError};
pub use tour::{CatalogError, TourCatalog};
