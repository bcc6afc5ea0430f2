use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduled departures of one tour on one calendar date.
///
/// `time_slots` holds `HH:MM` labels, sorted and without duplicates. Every
/// label shares the same `max_bookings_per_slot` ceiling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub date: NaiveDate,
    pub time_slots: Vec<String>,
    pub max_bookings_per_slot: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn new(tour_id: Uuid, date: NaiveDate, time_slots: Vec<String>, max_bookings_per_slot: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tour_id,
            date,
            time_slots,
            max_bookings_per_slot,
            is_available: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_time(&self, time: &str) -> bool {
        self.time_slots.iter().any(|t| t == time)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Capacity snapshot of a single departure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeCapacity {
    pub time: String,
    pub capacity: i32,
    pub booked: i64,
    pub remaining: i64,
}

/// Parses and canonicalises a departure label such as `9:30` into `09:30`.
pub fn normalize_time_label(label: &str) -> Option<String> {
    NaiveTime::parse_from_str(label.trim(), "%H:%M")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

/// Canonicalises a set of departure labels: sorted, deduplicated.
///
/// Returns the first offending label when one does not parse.
pub fn normalize_time_labels<I, S>(labels: I) -> Result<Vec<String>, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for label in labels {
        let label = label.as_ref();
        match normalize_time_label(label) {
            Some(l) => out.push(l),
            None => return Err(label.to_string()),
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}
