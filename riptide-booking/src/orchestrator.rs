use async_trait::async_trait;
use riptide_catalog::format_amount;
use riptide_core::payment::{
    IntentStatus, PaymentAdapter, PaymentCallback, PaymentError, PaymentIntent, PaymentOutcome,
};
use riptide_shared::BookingStatus;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;
use uuid::Uuid;

use crate::coordinator::ReservationError;
use crate::ledger::BookingLedger;

/// Bridges bookings and the payment provider.
pub struct PaymentOrchestrator {
    adapter: Arc<dyn PaymentAdapter>,
    ledger: BookingLedger,
    currency: String,
}

impl PaymentOrchestrator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>, ledger: BookingLedger, currency: impl Into<String>) -> Self {
        Self {
            adapter,
            ledger,
            currency: currency.into(),
        }
    }

    /// Open a payment intent for the full amount of a pending booking
    pub async fn initialize_payment(&self, booking_id: Uuid) -> Result<PaymentIntent, ReservationError> {
        let booking = self.ledger.get(booking_id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(ReservationError::InvalidTransition {
                from: booking.status,
                to: BookingStatus::Confirmed,
            });
        }

        let intent = self
            .adapter
            .create_intent(booking.id, booking.total_amount_cents, &self.currency)
            .await
            .map_err(|e| ReservationError::PaymentFailed {
                booking_id,
                reason: e.to_string(),
            })?;
        info!(
            booking_id = %booking_id,
            intent_id = %intent.id,
            amount = %format_amount(intent.amount_cents, &intent.currency),
            "payment intent created"
        );
        Ok(intent)
    }

    /// Ask the provider for the real state of an intent named in a webhook.
    ///
    /// Returns `None` while the intent has not settled either way.
    pub async fn verify_intent(&self, intent_id: &str) -> Result<Option<PaymentCallback>, PaymentError> {
        let intent = self.adapter.get_intent(intent_id).await?;

        let outcome = match intent.status {
            IntentStatus::Succeeded => PaymentOutcome::Succeeded,
            IntentStatus::Canceled => PaymentOutcome::Failed {
                reason: "payment canceled".to_string(),
            },
            IntentStatus::Failed => PaymentOutcome::Failed {
                reason: "payment declined".to_string(),
            },
            IntentStatus::RequiresPaymentMethod | IntentStatus::Processing => return Ok(None),
        };

        Ok(Some(PaymentCallback {
            booking_id: intent.booking_id,
            payment_reference: intent.id,
            outcome,
        }))
    }
}

/// In-process stand-in for a payment provider.
///
/// Intents start as `RequiresPaymentMethod`; [`set_status`](Self::set_status)
/// plays the part of the customer paying (or failing to).
#[derive(Default)]
pub struct MockPaymentAdapter {
    intents: Mutex<HashMap<String, PaymentIntent>>,
}

impl MockPaymentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, intent_id: &str, status: IntentStatus) -> Result<(), PaymentError> {
        let mut intents = self.intents.lock().unwrap_or_else(PoisonError::into_inner);
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))?;
        intent.status = status;
        Ok(())
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount_cents: i64,
        currency: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        if amount_cents <= 0 {
            return Err(PaymentError::Provider(format!("invalid amount {}", amount_cents)));
        }
        let intent = PaymentIntent {
            id: format!("mock_pi_{}", Uuid::new_v4().simple()),
            booking_id,
            amount_cents,
            currency: currency.to_string(),
            status: IntentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("mock_secret_{}", booking_id.simple())),
            created_at: chrono::Utc::now(),
        };
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.intents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentError::IntentNotFound(intent_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use riptide_core::AvailabilityRepository;
    use riptide_shared::{AvailabilitySlot, BookingDraft, Contact};
    use riptide_store::MemoryStore;

    async fn setup(total_amount_cents: i64) -> (PaymentOrchestrator, Arc<MockPaymentAdapter>, BookingLedger, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let tour_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        store
            .upsert_slot(&AvailabilitySlot::new(tour_id, date, vec!["10:00".into()], 8))
            .await
            .unwrap();
        let ledger = BookingLedger::new(store);
        let booking = ledger
            .create(BookingDraft {
                tour_id,
                customer_id: None,
                contact: Contact::new("guest@example.com", "Guest", "+1 555 0100"),
                date,
                time: "10:00".to_string(),
                participants: 2,
                total_amount_cents,
                special_requests: None,
            })
            .await
            .unwrap();
        let adapter = Arc::new(MockPaymentAdapter::new());
        let orchestrator = PaymentOrchestrator::new(adapter.clone(), ledger.clone(), "USD");
        (orchestrator, adapter, ledger, booking.id)
    }

    #[tokio::test]
    async fn test_intent_settles_into_callback() {
        let (orchestrator, adapter, _, booking_id) = setup(30_000).await;

        let intent = orchestrator.initialize_payment(booking_id).await.unwrap();
        assert_eq!(intent.amount_cents, 30_000);
        assert_eq!(intent.currency, "USD");
        assert!(orchestrator.verify_intent(&intent.id).await.unwrap().is_none());

        adapter.set_status(&intent.id, IntentStatus::Succeeded).unwrap();
        let callback = orchestrator.verify_intent(&intent.id).await.unwrap().unwrap();
        assert_eq!(callback.booking_id, booking_id);
        assert_eq!(callback.payment_reference, intent.id);
        assert_eq!(callback.outcome, PaymentOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_failed_intent_reports_failure() {
        let (orchestrator, adapter, _, booking_id) = setup(30_000).await;
        let intent = orchestrator.initialize_payment(booking_id).await.unwrap();

        adapter.set_status(&intent.id, IntentStatus::Failed).unwrap();
        let callback = orchestrator.verify_intent(&intent.id).await.unwrap().unwrap();
        assert!(matches!(callback.outcome, PaymentOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_only_pending_bookings_can_be_paid() {
        let (orchestrator, _, ledger, booking_id) = setup(30_000).await;
        ledger.update_status(booking_id, BookingStatus::Cancelled).await.unwrap();

        let err = orchestrator.initialize_payment(booking_id).await.unwrap_err();
        assert!(matches!(err, ReservationError::InvalidTransition { from: BookingStatus::Cancelled, .. }));
    }

    #[tokio::test]
    async fn test_provider_rejection_is_payment_failed() {
        let (orchestrator, _, _, booking_id) = setup(0).await;
        let err = orchestrator.initialize_payment(booking_id).await.unwrap_err();
        assert_eq!(err.kind(), "payment_failed");
    }

    #[tokio::test]
    async fn test_unknown_intent() {
        let (orchestrator, _, _, _) = setup(100).await;
        assert!(matches!(
            orchestrator.verify_intent("mock_pi_missing").await,
            Err(PaymentError::IntentNotFound(_))
        ));
    }
}
