use async_trait::async_trait;
use chrono::NaiveDate;
use riptide_shared::{AvailabilitySlot, Booking, BookingStatus, Tour};
use uuid::Uuid;

use crate::slot::SlotKey;

/// Errors raised by a store backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The guarded insert found fewer free places than requested
    #[error("Capacity conflict on {key}: requested {requested}, remaining {remaining}")]
    CapacityConflict {
        key: SlotKey,
        requested: i32,
        remaining: i64,
    },

    /// The departure disappeared, closed or lost the time label before commit
    #[error("Slot unavailable: {0}")]
    SlotUnavailable(SlotKey),

    /// A schedule change would drop a time that still holds active bookings
    #[error("Time still booked: {0}")]
    TimeInUse(SlotKey),

    /// A compare-and-set write found a different status than expected
    #[error("Booking {0} was modified concurrently")]
    StaleWrite(Uuid),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository trait for tour catalog access
#[async_trait]
pub trait TourRepository: Send + Sync {
    async fn insert_tour(&self, tour: &Tour) -> StoreResult<()>;

    async fn update_tour(&self, tour: &Tour) -> StoreResult<()>;

    async fn find_tour(&self, id: Uuid) -> StoreResult<Option<Tour>>;

    /// Tours in insertion order
    async fn list_tours(&self, active_only: bool) -> StoreResult<Vec<Tour>>;
}

/// Repository trait for scheduled departures
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Insert or replace the record for `(slot.tour_id, slot.date)`.
    async fn upsert_slot(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot>;

    /// Like [`upsert_slot`](Self::upsert_slot), but refuses to drop a time
    /// of the stored record that still has non-cancelled bookings.
    ///
    /// The booked-participant recount runs in the same critical section as
    /// the write and as [`BookingRepository::insert_within_capacity`], so no
    /// booking can land on a time between the check and its removal. Fails
    /// with [`StoreError::TimeInUse`].
    async fn replace_slot_if_unbooked(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot>;

    async fn find_slot(&self, tour_id: Uuid, date: NaiveDate) -> StoreResult<Option<AvailabilitySlot>>;

    /// Records with `from <= date <= to`, ordered by date
    async fn list_slots(
        &self,
        tour_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AvailabilitySlot>>;
}

/// Repository trait for bookings
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a pending booking if its departure still has room.
    ///
    /// The backend re-reads the departure and re-counts booked participants
    /// inside the same critical section as the insert, so two callers can
    /// never both take the last places. Fails with
    /// [`StoreError::CapacityConflict`] or [`StoreError::SlotUnavailable`].
    async fn insert_within_capacity(&self, booking: &Booking) -> StoreResult<Booking>;

    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    /// Persist status/payment fields only if the stored status is still
    /// `expected`; otherwise [`StoreError::StaleWrite`].
    async fn compare_and_update(&self, expected: BookingStatus, booking: &Booking) -> StoreResult<Booking>;

    /// Sum of participants over non-cancelled bookings for the departure
    async fn booked_participants(&self, key: &SlotKey) -> StoreResult<i64>;

    async fn list_for_slot(&self, key: &SlotKey) -> StoreResult<Vec<Booking>>;

    async fn list_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Booking>>;
}
