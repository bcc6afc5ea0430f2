use chrono::NaiveDate;
use riptide_core::{AvailabilityRepository, BookingRepository, SlotKey, StoreError};
use riptide_shared::models::availability::{normalize_time_label, normalize_time_labels};
use riptide_shared::{AvailabilitySlot, TimeCapacity};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::tour::{CatalogError, TourCatalog};

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("No availability scheduled for tour {tour_id} on {date}")]
    NotFound { tour_id: Uuid, date: NaiveDate },

    #[error("Time {0} is not scheduled for this date")]
    InvalidTime(String),

    #[error("Tour {tour_id} is closed on {date}")]
    Unavailable { tour_id: Uuid, date: NaiveDate },

    #[error("Time {0} still has active bookings")]
    TimeInUse(String),

    #[error("Invalid schedule: {0}")]
    Invalid(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-tour, per-date departure schedule with remaining-capacity lookups.
#[derive(Clone)]
pub struct AvailabilityLedger {
    catalog: TourCatalog,
    slots: Arc<dyn AvailabilityRepository>,
    bookings: Arc<dyn BookingRepository>,
}

impl AvailabilityLedger {
    pub fn new(
        catalog: TourCatalog,
        slots: Arc<dyn AvailabilityRepository>,
        bookings: Arc<dyn BookingRepository>,
    ) -> Self {
        Self {
            catalog,
            slots,
            bookings,
        }
    }

    pub async fn get_slot(&self, tour_id: Uuid, date: NaiveDate) -> Result<AvailabilitySlot, AvailabilityError> {
        self.slots
            .find_slot(tour_id, date)
            .await?
            .ok_or(AvailabilityError::NotFound { tour_id, date })
    }

    /// Places still free on a departure.
    ///
    /// Clamped at zero when capacity was lowered below what is already booked.
    pub async fn remaining_capacity(&self, key: &SlotKey) -> Result<i64, AvailabilityError> {
        let slot = self.get_slot(key.tour_id, key.date).await?;
        if !slot.is_available {
            return Err(AvailabilityError::Unavailable {
                tour_id: key.tour_id,
                date: key.date,
            });
        }
        if !slot.has_time(&key.time) {
            return Err(AvailabilityError::InvalidTime(key.time.clone()));
        }

        let booked = self.bookings.booked_participants(key).await?;
        let remaining = (i64::from(slot.max_bookings_per_slot) - booked).max(0);
        debug!(slot = %key, booked, remaining, "remaining capacity");
        Ok(remaining)
    }

    /// Capacity of every departure on a date, for the booking calendar
    pub async fn slot_overview(&self, tour_id: Uuid, date: NaiveDate) -> Result<Vec<TimeCapacity>, AvailabilityError> {
        let slot = self.get_slot(tour_id, date).await?;
        let mut out = Vec::with_capacity(slot.time_slots.len());
        for time in &slot.time_slots {
            let key = SlotKey::new(tour_id, date, time.clone());
            let booked = self.bookings.booked_participants(&key).await?;
            let remaining = if slot.is_available {
                (i64::from(slot.max_bookings_per_slot) - booked).max(0)
            } else {
                0
            };
            out.push(TimeCapacity {
                time: time.clone(),
                capacity: slot.max_bookings_per_slot,
                booked,
                remaining,
            });
        }
        Ok(out)
    }

    pub async fn list_slots(
        &self,
        tour_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>, AvailabilityError> {
        if from > to {
            return Err(AvailabilityError::Invalid(format!("range start {} is after end {}", from, to)));
        }
        Ok(self.slots.list_slots(tour_id, from, to).await?)
    }

    /// Create or replace the schedule of a tour on a date.
    ///
    /// Replacing a schedule may not drop a time that still has active bookings.
    pub async fn schedule(
        &self,
        tour_id: Uuid,
        date: NaiveDate,
        times: Vec<String>,
        max_bookings_per_slot: i32,
    ) -> Result<AvailabilitySlot, AvailabilityError> {
        self.catalog.get_tour(tour_id).await?;

        let times = normalize_time_labels(&times)
            .map_err(|bad| AvailabilityError::Invalid(format!("'{}' is not an HH:MM time", bad)))?;
        if times.is_empty() {
            return Err(AvailabilityError::Invalid("at least one time is required".to_string()));
        }
        validate_capacity(max_bookings_per_slot)?;

        let slot = match self.slots.find_slot(tour_id, date).await? {
            Some(mut existing) => {
                existing.time_slots = times;
                existing.max_bookings_per_slot = max_bookings_per_slot;
                existing.touch();
                existing
            }
            None => AvailabilitySlot::new(tour_id, date, times, max_bookings_per_slot),
        };

        let saved = self.save(&slot).await?;
        info!(
            tour_id = %tour_id,
            %date,
            times = ?saved.time_slots,
            max_bookings_per_slot,
            "availability scheduled"
        );
        Ok(saved)
    }

    pub async fn add_time(&self, tour_id: Uuid, date: NaiveDate, time: &str) -> Result<AvailabilitySlot, AvailabilityError> {
        let time = parse_time(time)?;
        let mut slot = self.get_slot(tour_id, date).await?;
        if slot.has_time(&time) {
            return Ok(slot);
        }
        slot.time_slots.push(time);
        slot.time_slots.sort();
        slot.touch();
        self.save(&slot).await
    }

    pub async fn remove_time(&self, tour_id: Uuid, date: NaiveDate, time: &str) -> Result<AvailabilitySlot, AvailabilityError> {
        let time = parse_time(time)?;
        let mut slot = self.get_slot(tour_id, date).await?;
        if !slot.has_time(&time) {
            return Err(AvailabilityError::InvalidTime(time));
        }
        if slot.time_slots.len() == 1 {
            return Err(AvailabilityError::Invalid(
                "cannot remove the last time; close the date instead".to_string(),
            ));
        }
        slot.time_slots.retain(|t| *t != time);
        slot.touch();
        self.save(&slot).await
    }

    pub async fn set_capacity(
        &self,
        tour_id: Uuid,
        date: NaiveDate,
        max_bookings_per_slot: i32,
    ) -> Result<AvailabilitySlot, AvailabilityError> {
        validate_capacity(max_bookings_per_slot)?;
        let mut slot = self.get_slot(tour_id, date).await?;
        slot.max_bookings_per_slot = max_bookings_per_slot;
        slot.touch();
        self.save(&slot).await
    }

    pub async fn set_available(
        &self,
        tour_id: Uuid,
        date: NaiveDate,
        is_available: bool,
    ) -> Result<AvailabilitySlot, AvailabilityError> {
        let mut slot = self.get_slot(tour_id, date).await?;
        slot.is_available = is_available;
        slot.touch();
        let saved = self.save(&slot).await?;
        info!(tour_id = %tour_id, %date, is_available, "availability flag changed");
        Ok(saved)
    }

    /// Guarded write: fails with `TimeInUse` if the stored record has a
    /// booked time that `slot` no longer lists.
    async fn save(&self, slot: &AvailabilitySlot) -> Result<AvailabilitySlot, AvailabilityError> {
        self.slots.replace_slot_if_unbooked(slot).await.map_err(|e| match e {
            StoreError::TimeInUse(key) => AvailabilityError::TimeInUse(key.time),
            other => other.into(),
        })
    }
}

fn parse_time(time: &str) -> Result<String, AvailabilityError> {
    normalize_time_label(time).ok_or_else(|| AvailabilityError::Invalid(format!("'{}' is not an HH:MM time", time)))
}

fn validate_capacity(max_bookings_per_slot: i32) -> Result<(), AvailabilityError> {
    if max_bookings_per_slot <= 0 {
        return Err(AvailabilityError::Invalid(format!(
            "max_bookings_per_slot must be positive, got {}",
            max_bookings_per_slot
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use riptide_core::StoreResult;
    use riptide_shared::{Booking, BookingDraft, Contact, Difficulty, TourDraft};
    use riptide_store::MemoryStore;
    use std::sync::Mutex;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: AvailabilityLedger,
        tour_id: Uuid,
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let catalog = TourCatalog::new(store.clone());
        let tour = catalog
            .publish(TourDraft {
                title: "NYC Skyline Adventure".to_string(),
                description: "Signature tour".to_string(),
                short_description: String::new(),
                duration_minutes: 90,
                max_participants: 8,
                price_cents: 15_000,
                image_url: None,
                gallery_images: vec![],
                features: vec![],
                difficulty: Difficulty::Beginner,
            })
            .await
            .unwrap();
        let ledger = AvailabilityLedger::new(catalog, store.clone(), store.clone());
        Fixture {
            store,
            ledger,
            tour_id: tour.id,
        }
    }

    fn pending(tour_id: Uuid, time: &str, participants: i32) -> Booking {
        Booking::new(BookingDraft {
            tour_id,
            customer_id: None,
            contact: Contact::new("a@example.com", "A", "1"),
            date: date(),
            time: time.to_string(),
            participants,
            total_amount_cents: 0,
            special_requests: None,
        })
    }

    async fn book(store: &MemoryStore, tour_id: Uuid, time: &str, participants: i32) -> Booking {
        store.insert_within_capacity(&pending(tour_id, time, participants)).await.unwrap()
    }

    /// Commits a queued booking just before the next schedule write reaches the store
    struct BookingBeforeWrite {
        inner: Arc<MemoryStore>,
        queued: Mutex<Option<Booking>>,
    }

    impl BookingBeforeWrite {
        async fn land_queued(&self) {
            let queued = self.queued.lock().unwrap().take();
            if let Some(booking) = queued {
                self.inner.insert_within_capacity(&booking).await.unwrap();
            }
        }
    }

    #[async_trait]
    impl AvailabilityRepository for BookingBeforeWrite {
        async fn upsert_slot(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot> {
            self.land_queued().await;
            self.inner.upsert_slot(slot).await
        }

        async fn replace_slot_if_unbooked(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot> {
            self.land_queued().await;
            self.inner.replace_slot_if_unbooked(slot).await
        }

        async fn find_slot(&self, tour_id: Uuid, date: NaiveDate) -> StoreResult<Option<AvailabilitySlot>> {
            self.inner.find_slot(tour_id, date).await
        }

        async fn list_slots(
            &self,
            tour_id: Uuid,
            from: NaiveDate,
            to: NaiveDate,
        ) -> StoreResult<Vec<AvailabilitySlot>> {
            self.inner.list_slots(tour_id, from, to).await
        }
    }

    fn ledger_with_booking_before_write(f: &Fixture, queued: Booking) -> AvailabilityLedger {
        let slots = Arc::new(BookingBeforeWrite {
            inner: f.store.clone(),
            queued: Mutex::new(Some(queued)),
        });
        AvailabilityLedger::new(TourCatalog::new(f.store.clone()), slots, f.store.clone())
    }

    #[tokio::test]
    async fn test_remaining_capacity_counts_participants() {
        let f = fixture().await;
        f.ledger
            .schedule(f.tour_id, date(), vec!["10:00".into(), "14:00".into()], 8)
            .await
            .unwrap();

        book(&f.store, f.tour_id, "10:00", 3).await;

        let key = SlotKey::new(f.tour_id, date(), "10:00");
        assert_eq!(f.ledger.remaining_capacity(&key).await.unwrap(), 5);

        let other = SlotKey::new(f.tour_id, date(), "14:00");
        assert_eq!(f.ledger.remaining_capacity(&other).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_remaining_capacity_errors() {
        let f = fixture().await;
        let key = SlotKey::new(f.tour_id, date(), "10:00");

        assert!(matches!(
            f.ledger.remaining_capacity(&key).await,
            Err(AvailabilityError::NotFound { .. })
        ));

        f.ledger.schedule(f.tour_id, date(), vec!["10:00".into()], 8).await.unwrap();
        let wrong_time = SlotKey::new(f.tour_id, date(), "11:00");
        assert!(matches!(
            f.ledger.remaining_capacity(&wrong_time).await,
            Err(AvailabilityError::InvalidTime(t)) if t == "11:00"
        ));

        f.ledger.set_available(f.tour_id, date(), false).await.unwrap();
        assert!(matches!(
            f.ledger.remaining_capacity(&key).await,
            Err(AvailabilityError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_lowered_capacity_clamps_at_zero() {
        let f = fixture().await;
        f.ledger.schedule(f.tour_id, date(), vec!["10:00".into()], 8).await.unwrap();
        book(&f.store, f.tour_id, "10:00", 6).await;

        f.ledger.set_capacity(f.tour_id, date(), 4).await.unwrap();

        let key = SlotKey::new(f.tour_id, date(), "10:00");
        assert_eq!(f.ledger.remaining_capacity(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schedule_requires_existing_tour_and_valid_input() {
        let f = fixture().await;

        assert!(matches!(
            f.ledger.schedule(Uuid::new_v4(), date(), vec!["10:00".into()], 8).await,
            Err(AvailabilityError::Catalog(CatalogError::NotFound(_)))
        ));
        assert!(matches!(
            f.ledger.schedule(f.tour_id, date(), vec!["10:00".into()], 0).await,
            Err(AvailabilityError::Invalid(_))
        ));
        assert!(matches!(
            f.ledger.schedule(f.tour_id, date(), vec!["ten".into()], 8).await,
            Err(AvailabilityError::Invalid(_))
        ));
        assert!(matches!(
            f.ledger.schedule(f.tour_id, date(), vec![], 8).await,
            Err(AvailabilityError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_reschedule_keeps_identity_and_protects_booked_times() {
        let f = fixture().await;
        let first = f
            .ledger
            .schedule(f.tour_id, date(), vec!["14:00".into(), "10:00".into()], 8)
            .await
            .unwrap();
        assert_eq!(first.time_slots, vec!["10:00", "14:00"]);

        book(&f.store, f.tour_id, "10:00", 2).await;

        assert!(matches!(
            f.ledger.schedule(f.tour_id, date(), vec!["14:00".into()], 8).await,
            Err(AvailabilityError::TimeInUse(t)) if t == "10:00"
        ));
        assert!(matches!(
            f.ledger.remove_time(f.tour_id, date(), "10:00").await,
            Err(AvailabilityError::TimeInUse(_))
        ));

        let second = f
            .ledger
            .schedule(f.tour_id, date(), vec!["10:00".into(), "16:00".into()], 6)
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.time_slots, vec!["10:00", "16:00"]);
        assert_eq!(second.max_bookings_per_slot, 6);
    }

    #[tokio::test]
    async fn test_add_and_remove_time() {
        let f = fixture().await;
        f.ledger.schedule(f.tour_id, date(), vec!["10:00".into()], 8).await.unwrap();

        let slot = f.ledger.add_time(f.tour_id, date(), "9:00").await.unwrap();
        assert_eq!(slot.time_slots, vec!["09:00", "10:00"]);

        let slot = f.ledger.remove_time(f.tour_id, date(), "10:00").await.unwrap();
        assert_eq!(slot.time_slots, vec!["09:00"]);

        assert!(matches!(
            f.ledger.remove_time(f.tour_id, date(), "09:00").await,
            Err(AvailabilityError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_slot_overview_and_range_listing() {
        let f = fixture().await;
        let next = date().succ_opt().unwrap();
        f.ledger.schedule(f.tour_id, date(), vec!["10:00".into(), "14:00".into()], 4).await.unwrap();
        f.ledger.schedule(f.tour_id, next, vec!["10:00".into()], 4).await.unwrap();
        book(&f.store, f.tour_id, "14:00", 1).await;

        let overview = f.ledger.slot_overview(f.tour_id, date()).await.unwrap();
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].remaining, 4);
        assert_eq!(overview[1].booked, 1);
        assert_eq!(overview[1].remaining, 3);

        let slots = f.ledger.list_slots(f.tour_id, date(), next).await.unwrap();
        assert_eq!(slots.iter().map(|s| s.date).collect::<Vec<_>>(), vec![date(), next]);

        assert!(matches!(
            f.ledger.list_slots(f.tour_id, next, date()).await,
            Err(AvailabilityError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_booking_landing_during_remove_time_keeps_its_time() {
        let f = fixture().await;
        f.ledger
            .schedule(f.tour_id, date(), vec!["10:00".into(), "14:00".into()], 8)
            .await
            .unwrap();
        let ledger = ledger_with_booking_before_write(&f, pending(f.tour_id, "10:00", 3));

        assert!(matches!(
            ledger.remove_time(f.tour_id, date(), "10:00").await,
            Err(AvailabilityError::TimeInUse(t)) if t == "10:00"
        ));

        let slot = f.ledger.get_slot(f.tour_id, date()).await.unwrap();
        assert_eq!(slot.time_slots, vec!["10:00", "14:00"]);
        let key = SlotKey::new(f.tour_id, date(), "10:00");
        assert_eq!(f.ledger.remaining_capacity(&key).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_booking_landing_during_reschedule_keeps_its_time() {
        let f = fixture().await;
        f.ledger
            .schedule(f.tour_id, date(), vec!["10:00".into(), "14:00".into()], 8)
            .await
            .unwrap();
        let ledger = ledger_with_booking_before_write(&f, pending(f.tour_id, "14:00", 2));

        assert!(matches!(
            ledger.schedule(f.tour_id, date(), vec!["10:00".into()], 8).await,
            Err(AvailabilityError::TimeInUse(t)) if t == "14:00"
        ));
        let slot = f.ledger.get_slot(f.tour_id, date()).await.unwrap();
        assert_eq!(slot.time_slots, vec!["10:00", "14:00"]);
    }
}
