pub mod coordinator;
pub mod ledger;
pub mod locks;
pub mod orchestrator;

pub use coordinator::{ReservationCoordinator, ReservationError, ReservationRequest, NO_CHARGE_REFERENCE};
pub use ledger::{can_transition, BookingError, BookingLedger};
pub use locks::SlotLocks;
pub use orchestrator::{MockPaymentAdapter, PaymentOrchestrator};
