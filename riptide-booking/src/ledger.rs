use riptide_core::{BookingRepository, SlotKey, StoreError};
use riptide_shared::{Booking, BookingDraft, BookingStatus, PaymentStatus};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Booking {0} was modified concurrently")]
    ConcurrentUpdate(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether the lifecycle allows moving a booking from `from` to `to`.
///
/// pending → confirmed | cancelled, confirmed → completed | cancelled.
/// Completed and cancelled are terminal.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
    )
}

/// Customer reservations and their status lifecycle.
///
/// Every status write is a compare-and-update against the status the
/// transition was validated from, so two racing transitions cannot both win.
#[derive(Clone)]
pub struct BookingLedger {
    repo: Arc<dyn BookingRepository>,
}

impl BookingLedger {
    pub fn new(repo: Arc<dyn BookingRepository>) -> Self {
        Self { repo }
    }

    /// Commit a new pending booking, provided its slot still has room.
    pub async fn create(&self, draft: BookingDraft) -> Result<Booking, BookingError> {
        let booking = self.repo.insert_within_capacity(&Booking::new(draft)).await?;
        info!(
            booking_id = %booking.id,
            tour_id = %booking.tour_id,
            date = %booking.booking_date,
            time = %booking.booking_time,
            participants = booking.participants,
            "booking created"
        );
        Ok(booking)
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.repo.find_booking(id).await?.ok_or(BookingError::NotFound(id))
    }

    /// Move a booking to `new_status`.
    ///
    /// Cancelling a confirmed booking marks a paid booking as refunded.
    pub async fn update_status(&self, id: Uuid, new_status: BookingStatus) -> Result<Booking, BookingError> {
        self.transition(id, new_status, |booking| {
            if booking.status == BookingStatus::Confirmed
                && new_status == BookingStatus::Cancelled
                && booking.payment_status == PaymentStatus::Paid
            {
                booking.payment_status = PaymentStatus::Refunded;
            }
            booking.status = new_status;
        })
        .await
    }

    /// Confirm a pending booking and record its payment in one write.
    ///
    /// The reference never changes without `payment_status` changing with it.
    pub async fn record_payment(&self, id: Uuid, payment_reference: &str) -> Result<Booking, BookingError> {
        let reference = payment_reference.to_string();
        self.transition(id, BookingStatus::Confirmed, move |booking| {
            booking.status = BookingStatus::Confirmed;
            booking.payment_status = PaymentStatus::Paid;
            booking.payment_reference = Some(reference.clone());
        })
        .await
    }

    pub async fn list_for_slot(&self, key: &SlotKey) -> Result<Vec<Booking>, BookingError> {
        Ok(self.repo.list_for_slot(key).await?)
    }

    pub async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Ok(self.repo.list_for_customer(customer_id).await?)
    }

    /// Validate and write a transition. A stale write is re-read once, so a
    /// transition that lost a race reports the status that beat it.
    async fn transition<F>(&self, id: Uuid, to: BookingStatus, apply: F) -> Result<Booking, BookingError>
    where
        F: Fn(&mut Booking),
    {
        for _ in 0..2 {
            let mut booking = self.get(id).await?;
            let from = booking.status;
            if !can_transition(from, to) {
                return Err(BookingError::InvalidTransition { from, to });
            }

            apply(&mut booking);
            booking.touch();

            match self.repo.compare_and_update(from, &booking).await {
                Ok(saved) => {
                    info!(booking_id = %id, %from, %to, "booking status changed");
                    return Ok(saved);
                }
                Err(StoreError::StaleWrite(_)) => {
                    debug!(booking_id = %id, %from, %to, "stale status write, re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(BookingError::ConcurrentUpdate(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use riptide_core::AvailabilityRepository;
    use riptide_shared::{AvailabilitySlot, Contact};
    use riptide_store::MemoryStore;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    async fn ledger_with_slot() -> (BookingLedger, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let tour_id = Uuid::new_v4();
        store
            .upsert_slot(&AvailabilitySlot::new(tour_id, date(), vec!["10:00".into()], 8))
            .await
            .unwrap();
        (BookingLedger::new(store), tour_id)
    }

    fn draft(tour_id: Uuid, participants: i32) -> BookingDraft {
        BookingDraft {
            tour_id,
            customer_id: Some(Uuid::new_v4()),
            contact: Contact::new("guest@example.com", "Guest", "+1 555 0100"),
            date: date(),
            time: "10:00".to_string(),
            participants,
            total_amount_cents: 15_000 * i64::from(participants),
            special_requests: None,
        }
    }

    #[test]
    fn test_transition_table() {
        use BookingStatus::*;
        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(Confirmed, Completed));
        assert!(can_transition(Confirmed, Cancelled));

        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Pending, Pending));
        assert!(!can_transition(Confirmed, Confirmed));
        for to in [Pending, Confirmed, Completed, Cancelled] {
            assert!(!can_transition(Completed, to));
            assert!(!can_transition(Cancelled, to));
        }
    }

    #[tokio::test]
    async fn test_booking_lifecycle() {
        let (ledger, tour_id) = ledger_with_slot().await;
        let booking = ledger.create(draft(tour_id, 2)).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);

        let confirmed = ledger.record_payment(booking.id, "pi_123").await.unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert_eq!(confirmed.payment_reference.as_deref(), Some("pi_123"));

        let completed = ledger.update_status(booking.id, BookingStatus::Completed).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
    }

    #[tokio::test]
    async fn test_completed_to_confirmed_is_rejected() {
        let (ledger, tour_id) = ledger_with_slot().await;
        let booking = ledger.create(draft(tour_id, 1)).await.unwrap();
        ledger.record_payment(booking.id, "pi_1").await.unwrap();
        ledger.update_status(booking.id, BookingStatus::Completed).await.unwrap();

        let err = ledger.update_status(booking.id, BookingStatus::Confirmed).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidTransition {
                from: BookingStatus::Completed,
                to: BookingStatus::Confirmed
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_confirmed_refunds() {
        let (ledger, tour_id) = ledger_with_slot().await;
        let booking = ledger.create(draft(tour_id, 3)).await.unwrap();
        ledger.record_payment(booking.id, "pi_9").await.unwrap();

        let cancelled = ledger.update_status(booking.id, BookingStatus::Cancelled).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Refunded);
        assert_eq!(cancelled.payment_reference.as_deref(), Some("pi_9"));
    }

    #[tokio::test]
    async fn test_cancel_pending_keeps_payment_pending() {
        let (ledger, tour_id) = ledger_with_slot().await;
        let booking = ledger.create(draft(tour_id, 3)).await.unwrap();

        let cancelled = ledger.update_status(booking.id, BookingStatus::Cancelled).await.unwrap();
        assert_eq!(cancelled.payment_status, PaymentStatus::Pending);

        let err = ledger.record_payment(booking.id, "pi_late").await.unwrap_err();
        assert!(matches!(err, BookingError::InvalidTransition { from: BookingStatus::Cancelled, .. }));
    }

    #[tokio::test]
    async fn test_unknown_booking() {
        let (ledger, _) = ledger_with_slot().await;
        let id = Uuid::new_v4();
        assert!(matches!(ledger.get(id).await, Err(BookingError::NotFound(got)) if got == id));
        assert!(matches!(
            ledger.update_status(id, BookingStatus::Cancelled).await,
            Err(BookingError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_lists() {
        let (ledger, tour_id) = ledger_with_slot().await;
        let first = ledger.create(draft(tour_id, 1)).await.unwrap();
        let second = ledger.create(draft(tour_id, 1)).await.unwrap();

        let key = SlotKey::new(tour_id, date(), "10:00");
        assert_eq!(ledger.list_for_slot(&key).await.unwrap().len(), 2);

        let mine = ledger.list_for_customer(first.customer_id.unwrap()).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, first.id);
        assert_ne!(mine[0].id, second.id);
    }
}
