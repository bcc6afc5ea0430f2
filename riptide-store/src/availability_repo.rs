use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use riptide_core::{AvailabilityRepository, SlotKey, StoreError, StoreResult};
use riptide_shared::AvailabilitySlot;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

pub struct StoreAvailabilityRepository {
    pool: PgPool,
}

impl StoreAvailabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct SlotRow {
    pub id: Uuid,
    pub tour_id: Uuid,
    pub date: NaiveDate,
    pub time_slots: Vec<String>,
    pub max_bookings_per_slot: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SlotRow> for AvailabilitySlot {
    fn from(row: SlotRow) -> Self {
        AvailabilitySlot {
            id: row.id,
            tour_id: row.tour_id,
            date: row.date,
            time_slots: row.time_slots,
            max_bookings_per_slot: row.max_bookings_per_slot,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) const SLOT_COLUMNS: &str =
    "id, tour_id, date, time_slots, max_bookings_per_slot, is_available, created_at, updated_at";

async fn write_slot<'e, E>(executor: E, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, SlotRow>(&format!(
        r#"
        INSERT INTO availability (id, tour_id, date, time_slots, max_bookings_per_slot, is_available, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (tour_id, date) DO UPDATE
        SET time_slots = EXCLUDED.time_slots,
            max_bookings_per_slot = EXCLUDED.max_bookings_per_slot,
            is_available = EXCLUDED.is_available,
            updated_at = EXCLUDED.updated_at
        RETURNING {}
        "#,
        SLOT_COLUMNS
    ))
    .bind(slot.id)
    .bind(slot.tour_id)
    .bind(slot.date)
    .bind(&slot.time_slots)
    .bind(slot.max_bookings_per_slot)
    .bind(slot.is_available)
    .bind(slot.created_at)
    .bind(slot.updated_at)
    .fetch_one(executor)
    .await
    .map_err(StoreError::backend)?;

    Ok(row.into())
}

#[async_trait]
impl AvailabilityRepository for StoreAvailabilityRepository {
    async fn upsert_slot(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot> {
        write_slot(&self.pool, slot).await
    }

    async fn replace_slot_if_unbooked(&self, slot: &AvailabilitySlot) -> StoreResult<AvailabilitySlot> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // Same row lock the booking insert takes, so the recount cannot go stale
        let stored: Option<Vec<String>> = sqlx::query_scalar(
            "SELECT time_slots FROM availability WHERE tour_id = $1 AND date = $2 FOR UPDATE",
        )
        .bind(slot.tour_id)
        .bind(slot.date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        for time in stored.unwrap_or_default().into_iter().filter(|t| !slot.has_time(t)) {
            let booked: i64 = sqlx::query_scalar(
                r#"
                SELECT COALESCE(SUM(participants), 0)::BIGINT
                FROM bookings
                WHERE tour_id = $1 AND booking_date = $2 AND booking_time = $3 AND status <> 'cancelled'
                "#,
            )
            .bind(slot.tour_id)
            .bind(slot.date)
            .bind(&time)
            .fetch_one(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

            if booked > 0 {
                return Err(StoreError::TimeInUse(SlotKey::new(slot.tour_id, slot.date, time)));
            }
        }

        let saved = write_slot(&mut *tx, slot).await?;
        tx.commit().await.map_err(StoreError::backend)?;
        Ok(saved)
    }

    async fn find_slot(&self, tour_id: Uuid, date: NaiveDate) -> StoreResult<Option<AvailabilitySlot>> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {} FROM availability WHERE tour_id = $1 AND date = $2",
            SLOT_COLUMNS
        ))
        .bind(tour_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Into::into))
    }

    async fn list_slots(
        &self,
        tour_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AvailabilitySlot>> {
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {} FROM availability WHERE tour_id = $1 AND date BETWEEN $2 AND $3 ORDER BY date",
            SLOT_COLUMNS
        ))
        .bind(tour_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
