use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use riptide_core::{BookingRepository, SlotKey, StoreError, StoreResult};
use riptide_shared::models::UnknownVariant;
use riptide_shared::{Booking, BookingStatus, Masked};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    tour_id: Uuid,
    customer_id: Option<Uuid>,
    customer_email: String,
    customer_name: String,
    customer_phone: String,
    booking_date: NaiveDate,
    booking_time: String,
    participants: i32,
    total_amount_cents: i64,
    status: String,
    payment_status: String,
    payment_reference: Option<String>,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = move |e: UnknownVariant| StoreError::Corrupt(format!("booking {}: {}", id, e));
        Ok(Booking {
            id: row.id,
            tour_id: row.tour_id,
            customer_id: row.customer_id,
            customer_email: Masked(row.customer_email),
            customer_name: row.customer_name,
            customer_phone: Masked(row.customer_phone),
            booking_date: row.booking_date,
            booking_time: row.booking_time,
            participants: row.participants,
            total_amount_cents: row.total_amount_cents,
            status: row.status.parse().map_err(corrupt)?,
            payment_status: row.payment_status.parse().map_err(corrupt)?,
            payment_reference: row.payment_reference,
            special_requests: row.special_requests,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, tour_id, customer_id, customer_email, customer_name, customer_phone, \
     booking_date, booking_time, participants, total_amount_cents, status, payment_status, \
     payment_reference, special_requests, created_at, updated_at";

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn insert_within_capacity(&self, booking: &Booking) -> StoreResult<Booking> {
        let key = SlotKey::new(booking.tour_id, booking.booking_date, booking.booking_time.clone());
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // Row lock on the availability record serializes every insert for this date
        let slot: Option<(i32, bool, Vec<String>)> = sqlx::query_as(
            r#"
            SELECT max_bookings_per_slot, is_available, time_slots
            FROM availability
            WHERE tour_id = $1 AND date = $2
            FOR UPDATE
            "#,
        )
        .bind(key.tour_id)
        .bind(key.date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        let max = match slot {
            Some((max, true, times)) if times.iter().any(|t| *t == key.time) => max,
            _ => return Err(StoreError::SlotUnavailable(key)),
        };

        let booked: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(participants), 0)::BIGINT
            FROM bookings
            WHERE tour_id = $1 AND booking_date = $2 AND booking_time = $3 AND status <> 'cancelled'
            "#,
        )
        .bind(key.tour_id)
        .bind(key.date)
        .bind(&key.time)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        let remaining = i64::from(max) - booked;
        if i64::from(booking.participants) > remaining {
            warn!(%key, requested = booking.participants, remaining, "capacity conflict at commit");
            return Err(StoreError::CapacityConflict {
                key,
                requested: booking.participants,
                remaining: remaining.max(0),
            });
        }

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            INSERT INTO bookings ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO NOTHING
            RETURNING {cols}
            "#,
            cols = BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.tour_id)
        .bind(booking.customer_id)
        .bind(booking.customer_email.expose())
        .bind(&booking.customer_name)
        .bind(booking.customer_phone.expose())
        .bind(booking.booking_date)
        .bind(&booking.booking_time)
        .bind(booking.participants)
        .bind(booking.total_amount_cents)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.payment_reference)
        .bind(&booking.special_requests)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?
        .ok_or_else(|| StoreError::Duplicate(format!("booking {}", booking.id)))?;

        tx.commit().await.map_err(StoreError::backend)?;
        Booking::try_from(row)
    }

    async fn find_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(Booking::try_from).transpose()
    }

    async fn compare_and_update(&self, expected: BookingStatus, booking: &Booking) -> StoreResult<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = $1, payment_status = $2, payment_reference = $3, updated_at = $4
            WHERE id = $5 AND status = $6
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.payment_reference)
        .bind(booking.updated_at)
        .bind(booking.id)
        .bind(expected.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        match row {
            Some(row) => Booking::try_from(row),
            None => {
                let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1)")
                    .bind(booking.id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(StoreError::backend)?;
                if exists {
                    Err(StoreError::StaleWrite(booking.id))
                } else {
                    Err(StoreError::NotFound(format!("booking {}", booking.id)))
                }
            }
        }
    }

    async fn booked_participants(&self, key: &SlotKey) -> StoreResult<i64> {
        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(participants), 0)::BIGINT
            FROM bookings
            WHERE tour_id = $1 AND booking_date = $2 AND booking_time = $3 AND status <> 'cancelled'
            "#,
        )
        .bind(key.tour_id)
        .bind(key.date)
        .bind(&key.time)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::backend)
    }

    async fn list_for_slot(&self, key: &SlotKey) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE tour_id = $1 AND booking_date = $2 AND booking_time = $3
            ORDER BY created_at
            "#,
            BOOKING_COLUMNS
        ))
        .bind(key.tour_id)
        .bind(key.date)
        .bind(&key.time)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE customer_id = $1 ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(Booking::try_from).collect()
    }
}
