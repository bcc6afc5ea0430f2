use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain events emitted after a booking change is committed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    Created {
        booking_id: Uuid,
        tour_id: Uuid,
        date: NaiveDate,
        time: String,
        participants: i32,
        total_amount_cents: i64,
        timestamp: i64,
    },
    Confirmed {
        booking_id: Uuid,
        payment_reference: String,
        timestamp: i64,
    },
    Cancelled {
        booking_id: Uuid,
        tour_id: Uuid,
        date: NaiveDate,
        time: String,
        released_participants: i32,
        refunded: bool,
        timestamp: i64,
    },
    Completed {
        booking_id: Uuid,
        timestamp: i64,
    },
}

impl BookingEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::Created { .. } => "booking.created",
            BookingEvent::Confirmed { .. } => "booking.confirmed",
            BookingEvent::Cancelled { .. } => "booking.cancelled",
            BookingEvent::Completed { .. } => "booking.completed",
        }
    }

    pub fn booking_id(&self) -> Uuid {
        match self {
            BookingEvent::Created { booking_id, .. }
            | BookingEvent::Confirmed { booking_id, .. }
            | BookingEvent::Cancelled { booking_id, .. }
            | BookingEvent::Completed { booking_id, .. } => *booking_id,
        }
    }
}

/// Pushed to live availability subscribers whenever a departure's remaining
/// capacity moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacityChangedEvent {
    pub tour_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub remaining: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged() {
        let id = Uuid::new_v4();
        let event = BookingEvent::Completed { booking_id: id, timestamp: 0 };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "completed");
        assert_eq!(event.topic(), "booking.completed");
        assert_eq!(event.booking_id(), id);
    }
}
