use chrono::{NaiveDate, Utc};
use riptide_catalog::{total_amount, AvailabilityError, AvailabilityLedger, CatalogError, PricingError, TourCatalog};
use riptide_core::payment::{PaymentCallback, PaymentOutcome};
use riptide_core::{EventPublisher, SlotKey, StoreError};
use riptide_shared::models::availability::normalize_time_label;
use riptide_shared::{Booking, BookingDraft, BookingEvent, BookingStatus, CapacityChangedEvent, Contact, PaymentStatus};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ledger::{BookingError, BookingLedger};
use crate::locks::SlotLocks;

/// Why a reservation or booking change was rejected
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("Tour not found: {0}")]
    TourNotFound(Uuid),

    #[error("Tour is not active: {0}")]
    TourInactive(Uuid),

    #[error("Participants must be between 1 and {max}, got {requested}")]
    InvalidParticipantCount { requested: i32, max: i32 },

    #[error("No availability for tour {tour_id} on {date}")]
    NoAvailability { tour_id: Uuid, date: NaiveDate },

    #[error("Time {0} is not offered on this date")]
    InvalidTimeSlot(String),

    #[error("Not enough capacity: requested {requested}, remaining {remaining}")]
    CapacityExceeded { requested: i32, remaining: i64 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("Payment failed for booking {booking_id}: {reason}")]
    PaymentFailed { booking_id: Uuid, reason: String },

    #[error("Invalid contact details: {0}")]
    InvalidContact(String),

    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("Booking {0} was modified concurrently")]
    Conflict(Uuid),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReservationError {
    /// Stable machine-readable rejection kind
    pub fn kind(&self) -> &'static str {
        match self {
            ReservationError::TourNotFound(_) | ReservationError::NotFound(_) => "not_found",
            ReservationError::TourInactive(_) => "tour_inactive",
            ReservationError::InvalidParticipantCount { .. } => "invalid_participant_count",
            ReservationError::NoAvailability { .. } => "no_availability",
            ReservationError::InvalidTimeSlot(_) => "invalid_time_slot",
            ReservationError::CapacityExceeded { .. } => "capacity_exceeded",
            ReservationError::InvalidTransition { .. } => "invalid_transition",
            ReservationError::PaymentFailed { .. } => "payment_failed",
            ReservationError::InvalidContact(_) => "invalid_contact",
            ReservationError::Conflict(_) => "conflict",
            ReservationError::Pricing(_) => "validation",
            ReservationError::Store(_) => "store",
        }
    }
}

impl From<BookingError> for ReservationError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(id) => ReservationError::NotFound(id),
            BookingError::InvalidTransition { from, to } => ReservationError::InvalidTransition { from, to },
            BookingError::ConcurrentUpdate(id) => ReservationError::Conflict(id),
            BookingError::Store(e) => ReservationError::Store(e),
        }
    }
}

/// A customer's request for places on one departure
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub tour_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub participants: i32,
    pub contact: Contact,
    pub customer_id: Option<Uuid>,
    pub special_requests: Option<String>,
}

const CAPACITY_CHANNEL_SIZE: usize = 256;

/// Payment reference recorded on bookings of free tours
pub const NO_CHARGE_REFERENCE: &str = "no_charge";

/// Enforces the no-oversell rule for every departure.
///
/// Capacity check and booking commit for one departure run under that
/// departure's [`SlotLocks`] guard, and the store re-checks capacity inside
/// the commit itself. A commit that still loses (another process sharing the
/// database got there first) is re-checked once before the request is
/// rejected with [`ReservationError::CapacityExceeded`].
#[derive(Clone)]
pub struct ReservationCoordinator {
    catalog: TourCatalog,
    availability: AvailabilityLedger,
    ledger: BookingLedger,
    locks: Arc<SlotLocks>,
    publisher: Arc<dyn EventPublisher>,
    capacity_tx: broadcast::Sender<CapacityChangedEvent>,
}

impl ReservationCoordinator {
    pub fn new(
        catalog: TourCatalog,
        availability: AvailabilityLedger,
        ledger: BookingLedger,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let (capacity_tx, _) = broadcast::channel(CAPACITY_CHANNEL_SIZE);
        Self {
            catalog,
            availability,
            ledger,
            locks: Arc::new(SlotLocks::new()),
            publisher,
            capacity_tx,
        }
    }

    /// Live remaining-capacity updates for every departure
    pub fn subscribe(&self) -> broadcast::Receiver<CapacityChangedEvent> {
        self.capacity_tx.subscribe()
    }

    pub fn ledger(&self) -> &BookingLedger {
        &self.ledger
    }

    pub async fn reserve(&self, request: ReservationRequest) -> Result<Booking, ReservationError> {
        let contact = validate_contact(&request.contact)?;

        let tour = self.catalog.get_active_tour(request.tour_id).await.map_err(|e| match e {
            CatalogError::NotFound(id) => ReservationError::TourNotFound(id),
            CatalogError::Inactive(id) => ReservationError::TourInactive(id),
            CatalogError::Store(e) => ReservationError::Store(e),
            CatalogError::Invalid(_) => ReservationError::TourNotFound(request.tour_id),
        })?;

        if request.participants < 1 || request.participants > tour.max_participants {
            return Err(ReservationError::InvalidParticipantCount {
                requested: request.participants,
                max: tour.max_participants,
            });
        }

        let no_availability = ReservationError::NoAvailability {
            tour_id: tour.id,
            date: request.date,
        };
        let slot = match self.availability.get_slot(tour.id, request.date).await {
            Ok(slot) if slot.is_available => slot,
            Ok(_) | Err(AvailabilityError::NotFound { .. }) => return Err(no_availability),
            Err(e) => return Err(availability_rejection(e, &request)),
        };

        let time = normalize_time_label(&request.time)
            .filter(|t| slot.has_time(t))
            .ok_or_else(|| ReservationError::InvalidTimeSlot(request.time.clone()))?;

        let total_amount_cents = total_amount(tour.price_cents, request.participants)?;
        let key = SlotKey::new(tour.id, request.date, time.clone());
        let draft = BookingDraft {
            tour_id: tour.id,
            customer_id: request.customer_id,
            contact,
            date: request.date,
            time,
            participants: request.participants,
            total_amount_cents,
            special_requests: request.special_requests.clone(),
        };

        let booking = {
            let _guard = self.locks.acquire(&key).await;
            self.commit(&key, draft, &request).await?
        };

        self.emit(BookingEvent::Created {
            booking_id: booking.id,
            tour_id: booking.tour_id,
            date: booking.booking_date,
            time: booking.booking_time.clone(),
            participants: booking.participants,
            total_amount_cents: booking.total_amount_cents,
            timestamp: Utc::now().timestamp(),
        })
        .await;
        self.announce_capacity(&key).await;

        if booking.total_amount_cents == 0 {
            return self.confirm_without_charge(booking.id).await;
        }
        Ok(booking)
    }

    /// A free departure has nothing to collect, so it is confirmed on the spot.
    async fn confirm_without_charge(&self, booking_id: Uuid) -> Result<Booking, ReservationError> {
        let booking = self.ledger.record_payment(booking_id, NO_CHARGE_REFERENCE).await?;
        info!(booking_id = %booking.id, "free booking confirmed without payment");
        self.emit(BookingEvent::Confirmed {
            booking_id: booking.id,
            payment_reference: NO_CHARGE_REFERENCE.to_string(),
            timestamp: Utc::now().timestamp(),
        })
        .await;
        Ok(booking)
    }

    /// Check remaining capacity and commit, re-checking once if the store
    /// reports the departure filled up between the two.
    async fn commit(
        &self,
        key: &SlotKey,
        draft: BookingDraft,
        request: &ReservationRequest,
    ) -> Result<Booking, ReservationError> {
        let requested = draft.participants;
        let mut retried = false;
        loop {
            let remaining = self
                .availability
                .remaining_capacity(key)
                .await
                .map_err(|e| availability_rejection(e, request))?;
            if remaining < i64::from(requested) {
                info!(slot = %key, requested, remaining, "reservation rejected: capacity exceeded");
                return Err(ReservationError::CapacityExceeded { requested, remaining });
            }

            match self.ledger.create(draft.clone()).await {
                Ok(booking) => return Ok(booking),
                Err(BookingError::Store(StoreError::CapacityConflict { remaining, .. })) => {
                    if retried {
                        warn!(slot = %key, requested, remaining, "capacity conflict persisted after retry");
                        return Err(ReservationError::CapacityExceeded { requested, remaining });
                    }
                    warn!(slot = %key, requested, remaining, "capacity conflict at commit, re-checking");
                    retried = true;
                }
                Err(BookingError::Store(StoreError::SlotUnavailable(_))) => {
                    return Err(ReservationError::NoAvailability {
                        tour_id: key.tour_id,
                        date: key.date,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Cancel a pending or confirmed booking, releasing its places.
    pub async fn cancel(&self, booking_id: Uuid) -> Result<Booking, ReservationError> {
        let booking = self.ledger.update_status(booking_id, BookingStatus::Cancelled).await?;
        self.after_cancel(&booking).await;
        Ok(booking)
    }

    /// Mark a confirmed booking as taken place
    pub async fn complete(&self, booking_id: Uuid) -> Result<Booking, ReservationError> {
        let booking = self.ledger.update_status(booking_id, BookingStatus::Completed).await?;
        self.emit(BookingEvent::Completed {
            booking_id: booking.id,
            timestamp: Utc::now().timestamp(),
        })
        .await;
        Ok(booking)
    }

    /// Apply a verified payment callback.
    ///
    /// Success confirms the booking and records the reference; failure
    /// cancels it and releases its places. Redelivered callbacks for a
    /// booking already in the resulting state are acknowledged unchanged.
    pub async fn handle_payment(&self, callback: PaymentCallback) -> Result<Booking, ReservationError> {
        let current = self.ledger.get(callback.booking_id).await?;

        match callback.outcome {
            PaymentOutcome::Succeeded => {
                if current.status == BookingStatus::Confirmed
                    && current.payment_reference.as_deref() == Some(callback.payment_reference.as_str())
                {
                    return Ok(current);
                }
                let booking = self
                    .ledger
                    .record_payment(callback.booking_id, &callback.payment_reference)
                    .await?;
                info!(booking_id = %booking.id, "payment succeeded, booking confirmed");
                self.emit(BookingEvent::Confirmed {
                    booking_id: booking.id,
                    payment_reference: callback.payment_reference,
                    timestamp: Utc::now().timestamp(),
                })
                .await;
                Ok(booking)
            }
            PaymentOutcome::Failed { reason } => {
                if current.status == BookingStatus::Cancelled {
                    return Ok(current);
                }
                if current.status != BookingStatus::Pending {
                    return Err(ReservationError::InvalidTransition {
                        from: current.status,
                        to: BookingStatus::Cancelled,
                    });
                }
                let booking = self
                    .ledger
                    .update_status(callback.booking_id, BookingStatus::Cancelled)
                    .await?;
                warn!(booking_id = %booking.id, %reason, "payment failed, booking cancelled");
                self.after_cancel(&booking).await;
                Ok(booking)
            }
        }
    }

    async fn after_cancel(&self, booking: &Booking) {
        let key = SlotKey::new(booking.tour_id, booking.booking_date, booking.booking_time.clone());
        self.emit(BookingEvent::Cancelled {
            booking_id: booking.id,
            tour_id: booking.tour_id,
            date: booking.booking_date,
            time: booking.booking_time.clone(),
            released_participants: booking.participants,
            refunded: booking.payment_status == PaymentStatus::Refunded,
            timestamp: Utc::now().timestamp(),
        })
        .await;
        self.announce_capacity(&key).await;
    }

    /// Events are published after the commit; a failed publish is logged and
    /// never undoes the change.
    async fn emit(&self, event: BookingEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(booking_id = %event.booking_id(), topic = event.topic(), "event publish failed: {}", e);
        }
    }

    /// Broadcast the remaining capacity of every departure on a date.
    ///
    /// Called after staff reschedule a date or change its capacity or
    /// availability flag.
    pub async fn announce_schedule(&self, tour_id: Uuid, date: NaiveDate) {
        if self.capacity_tx.receiver_count() == 0 {
            return;
        }
        match self.availability.slot_overview(tour_id, date).await {
            Ok(times) => {
                for time in times {
                    let _ = self.capacity_tx.send(CapacityChangedEvent {
                        tour_id,
                        date,
                        time: time.time,
                        remaining: time.remaining,
                    });
                }
            }
            Err(e) => warn!(tour_id = %tour_id, %date, "could not read schedule for subscribers: {}", e),
        }
    }

    async fn announce_capacity(&self, key: &SlotKey) {
        if self.capacity_tx.receiver_count() == 0 {
            return;
        }
        match self.availability.remaining_capacity(key).await {
            Ok(remaining) => {
                let _ = self.capacity_tx.send(CapacityChangedEvent {
                    tour_id: key.tour_id,
                    date: key.date,
                    time: key.time.clone(),
                    remaining,
                });
            }
            Err(e) => warn!(slot = %key, "could not read capacity for subscribers: {}", e),
        }
    }
}

fn availability_rejection(err: AvailabilityError, request: &ReservationRequest) -> ReservationError {
    match err {
        AvailabilityError::NotFound { tour_id, date } | AvailabilityError::Unavailable { tour_id, date } => {
            ReservationError::NoAvailability { tour_id, date }
        }
        AvailabilityError::InvalidTime(time) => ReservationError::InvalidTimeSlot(time),
        AvailabilityError::Store(e) | AvailabilityError::Catalog(CatalogError::Store(e)) => ReservationError::Store(e),
        AvailabilityError::Catalog(_) | AvailabilityError::TimeInUse(_) | AvailabilityError::Invalid(_) => {
            ReservationError::NoAvailability {
                tour_id: request.tour_id,
                date: request.date,
            }
        }
    }
}

/// Trim the contact fields and require each to be present
fn validate_contact(contact: &Contact) -> Result<Contact, ReservationError> {
    let email = contact.email.expose().trim();
    let name = contact.name.trim();
    let phone = contact.phone.expose().trim();

    if email.is_empty() {
        return Err(ReservationError::InvalidContact("email is required".to_string()));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(ReservationError::InvalidContact("email is malformed".to_string())),
    }
    if name.is_empty() {
        return Err(ReservationError::InvalidContact("name is required".to_string()));
    }
    if phone.is_empty() {
        return Err(ReservationError::InvalidContact("phone is required".to_string()));
    }

    Ok(Contact::new(email, name, phone))
}
