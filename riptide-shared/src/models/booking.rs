use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;
use crate::pii::Masked;

/// Booking status in the reservation lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Whether a booking in this status still occupies slot capacity
    pub fn holds_capacity(&self) -> bool {
        *self != BookingStatus::Cancelled
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "booking status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(UnknownVariant {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

/// Contact details captured with every reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub email: Masked<String>,
    pub name: String,
    pub phone: Masked<String>,
}

impl Contact {
    pub fn new(email: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            email: Masked(email.into()),
            name: name.into(),
            phone: Masked(phone.into()),
        }
    }
}

/// A customer reservation against one departure of a tour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub customer_email: Masked<String>,
    pub customer_name: String,
    pub customer_phone: Masked<String>,
    pub booking_date: NaiveDate,
    pub booking_time: String,
    pub participants: i32,
    pub total_amount_cents: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(draft: BookingDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tour_id: draft.tour_id,
            customer_id: draft.customer_id,
            customer_email: draft.contact.email,
            customer_name: draft.contact.name,
            customer_phone: draft.contact.phone,
            booking_date: draft.date,
            booking_time: draft.time,
            participants: draft.participants,
            total_amount_cents: draft.total_amount_cents,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            special_requests: draft.special_requests,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Everything the booking ledger needs to create a booking
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub tour_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub contact: Contact,
    pub date: NaiveDate,
    pub time: String,
    pub participants: i32,
    pub total_amount_cents: i64,
    pub special_requests: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_booking_is_pending() {
        let booking = Booking::new(BookingDraft {
            tour_id: Uuid::new_v4(),
            customer_id: None,
            contact: Contact::new("rider@example.com", "Sam Rider", "+1 555 0100"),
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            time: "10:00".to_string(),
            participants: 2,
            total_amount_cents: 30_000,
            special_requests: None,
        });

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentStatus::Pending);
        assert!(booking.payment_reference.is_none());
        assert!(booking.customer_id.is_none());
    }

    #[test]
    fn test_contact_is_masked_in_debug() {
        let contact = Contact::new("rider@example.com", "Sam Rider", "+1 555 0100");
        let debug = format!("{:?}", contact);
        assert!(!debug.contains("rider@example.com"));
        assert!(!debug.contains("555"));
    }

    #[test]
    fn test_status_round_trips_through_labels() {
        for s in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Completed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<BookingStatus>().unwrap(), s);
        }
        assert!(!BookingStatus::Cancelled.holds_capacity());
        assert!(BookingStatus::Completed.is_terminal());
    }
}
