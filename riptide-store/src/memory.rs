use async_trait::async_trait;
use chrono::NaiveDate;
use riptide_core::{
    AvailabilityRepository, BookingRepository, SlotKey, StoreError, StoreResult, TourRepository,
};
use riptide_shared::{AvailabilitySlot, Booking, BookingStatus, Tour};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    tours: Vec<Tour>,
    slots: HashMap<(Uuid, NaiveDate), AvailabilitySlot>,
    bookings: HashMap<Uuid, Booking>,
}

impl Tables {
    fn booked(&self, key: &SlotKey) -> i64 {
        self.bookings
            .values()
            .filter(|b| {
                b.tour_id == key.tour_id
                    && b.booking_date == key.date
                    && b.booking_time == key.time
                    && b.status.holds_capacity()
            })
            .map(|b| i64::from(b.participants))
            .sum()
    }

    fn upsert_slot(&mut self, slot: &AvailabilitySlot) -> AvailabilitySlot {
        self.slots
            .entry((slot.tour_id, slot.date))
            .and_modify(|existing| {
                existing.time_slots = slot.time_slots.clone();
                existing.max_bookings_per_slot = slot.max_bookings_per_slot;
                existing.is_available = slot.is_available;
                existing.updated_at = slot.updated_at;
            })
            .or_insert_with(|| slot.clone())
            .clone()
    }
}

/// In-process store backing all three repositories.
///
/// One mutex guards every table, so the capacity check and the insert in
/// [`BookingRepository::insert_within_capacity`] form one critical section.
/// Used by tests and the `memory` store mode.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TourRepository for MemoryStore {
    async fn insert_tour(&self, tour: &Tour) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.tours.iter().any(|t| t.id == tour.id) {
            return Err(StoreError::Duplicate(format!("tour {}", tour.id)));
        }
        tables.tours.push(tour.clone());
        Ok(())
    }

    async fn update_tour(&self, tour: &Tour) -> StoreResult<()> {
        let mut tables = self.lock();
        let existing = tables
            .tours
            .iter_mut()
            .find(|t| t.id == tour.id)
            .ok_or_else(|| StoreError::NotFound(format!("tour {}", tour.id)))?;
        *existing = tour.clone();
        Ok(())
    }

    async fn find_tour(&self, id: Uuid) -> StoreResult<Option<Tour>> {
        Ok(self.lock().tours.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tours(&self, active_only: bool) -> StoreResult<Vec<Tour>> {
        Ok(self
            .lock()
            .tours
            .iter()
            .filter(|t| !active_only || t.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AvailabilityRepository for MemoryStore {
    async fn upsert_slot(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot> {
        Ok(self.lock().upsert_slot(slot))
    }

    async fn replace_slot_if_unbooked(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot> {
        let mut tables = self.lock();
        if let Some(existing) = tables.slots.get(&(slot.tour_id, slot.date)) {
            for time in existing.time_slots.iter().filter(|t| !slot.has_time(t)) {
                let key = SlotKey::new(slot.tour_id, slot.date, time.clone());
                if tables.booked(&key) > 0 {
                    return Err(StoreError::TimeInUse(key));
                }
            }
        }
        Ok(tables.upsert_slot(slot))
    }

    async fn find_slot(&self, tour_id: Uuid, date: NaiveDate) -> StoreResult<Option<AvailabilitySlot>> {
        Ok(self.lock().slots.get(&(tour_id, date)).cloned())
    }

    async fn list_slots(
        &self,
        tour_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AvailabilitySlot>> {
        let mut slots: Vec<AvailabilitySlot> = self
            .lock()
            .slots
            .values()
            .filter(|s| s.tour_id == tour_id && s.date >= from && s.date <= to)
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.date);
        Ok(slots)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert_within_capacity(&self, booking: &Booking) -> StoreResult<Booking> {
        let mut tables = self.lock();
        let key = SlotKey::new(booking.tour_id, booking.booking_date, booking.booking_time.clone());

        let max = match tables.slots.get(&(key.tour_id, key.date)) {
            Some(slot) if slot.is_available && slot.has_time(&key.time) => slot.max_bookings_per_slot,
            _ => return Err(StoreError::SlotUnavailable(key)),
        };

        let remaining = i64::from(max) - tables.booked(&key);
        if i64::from(booking.participants) > remaining {
            return Err(StoreError::CapacityConflict {
                key,
                requested: booking.participants,
                remaining: remaining.max(0),
            });
        }
        if tables.bookings.contains_key(&booking.id) {
            return Err(StoreError::Duplicate(format!("booking {}", booking.id)));
        }

        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking.clone())
    }

    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.lock().bookings.get(&id).cloned())
    }

    async fn compare_and_update(&self, expected: BookingStatus, booking: &Booking) -> StoreResult<Booking> {
        let mut tables = self.lock();
        let stored = tables
            .bookings
            .get_mut(&booking.id)
            .ok_or_else(|| StoreError::NotFound(format!("booking {}", booking.id)))?;
        if stored.status != expected {
            return Err(StoreError::StaleWrite(booking.id));
        }

        stored.status = booking.status;
        stored.payment_status = booking.payment_status;
        stored.payment_reference = booking.payment_reference.clone();
        stored.updated_at = booking.updated_at;
        Ok(stored.clone())
    }

    async fn booked_participants(&self, key: &SlotKey) -> StoreResult<i64> {
        Ok(self.lock().booked(key))
    }

    async fn list_for_slot(&self, key: &SlotKey) -> StoreResult<Vec<Booking>> {
        let mut out: Vec<Booking> = self
            .lock()
            .bookings
            .values()
            .filter(|b| b.tour_id == key.tour_id && b.booking_date == key.date && b.booking_time == key.time)
            .cloned()
            .collect();
        out.sort_by_key(|b| b.created_at);
        Ok(out)
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Booking>> {
        let mut out: Vec<Booking> = self
            .lock()
            .bookings
            .values()
            .filter(|b| b.customer_id == Some(customer_id))
            .cloned()
            .collect();
        out.sort_by_key(|b| b.created_at);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_shared::{BookingDraft, Contact};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
    }

    fn booking(tour_id: Uuid, participants: i32) -> Booking {
        Booking::new(BookingDraft {
            tour_id,
            customer_id: None,
            contact: Contact::new("a@example.com", "A", "1"),
            date: date(),
            time: "10:00".to_string(),
            participants,
            total_amount_cents: 0,
            special_requests: None,
        })
    }

    #[tokio::test]
    async fn test_insert_within_capacity_guards_the_slot() {
        let store = MemoryStore::new();
        let tour_id = Uuid::new_v4();
        store
            .upsert_slot(&AvailabilitySlot::new(tour_id, date(), vec!["10:00".into()], 8))
            .await
            .unwrap();

        store.insert_within_capacity(&booking(tour_id, 5)).await.unwrap();

        let err = store.insert_within_capacity(&booking(tour_id, 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::CapacityConflict { requested: 5, remaining: 3, .. }));

        store.insert_within_capacity(&booking(tour_id, 3)).await.unwrap();
        let key = SlotKey::new(tour_id, date(), "10:00");
        assert_eq!(store.booked_participants(&key).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_insert_requires_open_slot_with_time() {
        let store = MemoryStore::new();
        let tour_id = Uuid::new_v4();

        assert!(matches!(
            store.insert_within_capacity(&booking(tour_id, 1)).await,
            Err(StoreError::SlotUnavailable(_))
        ));

        let mut slot = AvailabilitySlot::new(tour_id, date(), vec!["10:00".into()], 8);
        slot.is_available = false;
        store.upsert_slot(&slot).await.unwrap();
        assert!(matches!(
            store.insert_within_capacity(&booking(tour_id, 1)).await,
            Err(StoreError::SlotUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_compare_and_update_detects_stale_status() {
        let store = MemoryStore::new();
        let tour_id = Uuid::new_v4();
        store
            .upsert_slot(&AvailabilitySlot::new(tour_id, date(), vec!["10:00".into()], 8))
            .await
            .unwrap();
        let mut b = store.insert_within_capacity(&booking(tour_id, 2)).await.unwrap();

        b.status = BookingStatus::Cancelled;
        store.compare_and_update(BookingStatus::Pending, &b).await.unwrap();

        b.status = BookingStatus::Confirmed;
        assert!(matches!(
            store.compare_and_update(BookingStatus::Pending, &b).await,
            Err(StoreError::StaleWrite(id)) if id == b.id
        ));

        let key = SlotKey::new(tour_id, date(), "10:00");
        assert_eq!(store.booked_participants(&key).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_slot_keeps_booked_times() {
        let store = MemoryStore::new();
        let tour_id = Uuid::new_v4();
        store
            .upsert_slot(&AvailabilitySlot::new(tour_id, date(), vec!["10:00".into(), "14:00".into()], 8))
            .await
            .unwrap();
        store.insert_within_capacity(&booking(tour_id, 2)).await.unwrap();

        let mut without_ten = AvailabilitySlot::new(tour_id, date(), vec!["14:00".into()], 8);
        assert!(matches!(
            store.replace_slot_if_unbooked(&without_ten).await,
            Err(StoreError::TimeInUse(key)) if key.time == "10:00"
        ));
        let stored = store.find_slot(tour_id, date()).await.unwrap().unwrap();
        assert_eq!(stored.time_slots, vec!["10:00", "14:00"]);

        without_ten.time_slots = vec!["10:00".into()];
        let saved = store.replace_slot_if_unbooked(&without_ten).await.unwrap();
        assert_eq!(saved.time_slots, vec!["10:00"]);
        assert_eq!(saved.id, stored.id);
    }
}
