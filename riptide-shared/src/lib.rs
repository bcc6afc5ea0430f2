pub mod models;
pub mod pii;

pub use models::availability::{AvailabilitySlot, TimeCapacity};
pub use models::booking::{Booking, BookingDraft, BookingStatus, Contact, PaymentStatus};
pub use models::events::{BookingEvent, CapacityChangedEvent};
pub use models::profile::Role;
pub use models::tour::{Difficulty, Tour, TourDraft, TourPatch};
pub use pii::Masked;
