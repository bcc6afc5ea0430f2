use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A bookable departure: one time label of one tour on one date.
///
/// Capacity checks and booking commits are serialized per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub tour_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
}

impl SlotKey {
    pub fn new(tour_id: Uuid, date: NaiveDate, time: impl Into<String>) -> Self {
        Self {
            tour_id,
            date,
            time: time.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tour_id, self.date, self.time)
    }
}
