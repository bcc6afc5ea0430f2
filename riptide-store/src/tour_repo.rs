use async_trait::async_trait;
use chrono::{DateTime, Utc};
use riptide_core::{StoreError, StoreResult, TourRepository};
use riptide_shared::Tour;
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreTourRepository {
    pool: PgPool,
}

impl StoreTourRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct TourRow {
    id: Uuid,
    title: String,
    description: String,
    short_description: String,
    duration_minutes: i32,
    max_participants: i32,
    price_cents: i64,
    image_url: Option<String>,
    gallery_images: Vec<String>,
    features: Vec<String>,
    difficulty_level: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TourRow> for Tour {
    type Error = StoreError;

    fn try_from(row: TourRow) -> Result<Self, Self::Error> {
        Ok(Tour {
            id: row.id,
            title: row.title,
            description: row.description,
            short_description: row.short_description,
            duration_minutes: row.duration_minutes,
            max_participants: row.max_participants,
            price_cents: row.price_cents,
            image_url: row.image_url,
            gallery_images: row.gallery_images,
            features: row.features,
            difficulty: row
                .difficulty_level
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("tour {}: {}", row.id, e)))?,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TOUR_COLUMNS: &str = "id, title, description, short_description, duration_minutes, max_participants, \
     price_cents, image_url, gallery_images, features, difficulty_level, is_active, created_at, updated_at";

#[async_trait]
impl TourRepository for StoreTourRepository {
    async fn insert_tour(&self, tour: &Tour) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tours (id, title, description, short_description, duration_minutes, max_participants,
                               price_cents, image_url, gallery_images, features, difficulty_level, is_active,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(tour.id)
        .bind(&tour.title)
        .bind(&tour.description)
        .bind(&tour.short_description)
        .bind(tour.duration_minutes)
        .bind(tour.max_participants)
        .bind(tour.price_cents)
        .bind(&tour.image_url)
        .bind(&tour.gallery_images)
        .bind(&tour.features)
        .bind(tour.difficulty.as_str())
        .bind(tour.is_active)
        .bind(tour.created_at)
        .bind(tour.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn update_tour(&self, tour: &Tour) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tours
            SET title = $1, description = $2, short_description = $3, duration_minutes = $4,
                max_participants = $5, price_cents = $6, image_url = $7, gallery_images = $8,
                features = $9, difficulty_level = $10, is_active = $11, updated_at = $12
            WHERE id = $13
            "#,
        )
        .bind(&tour.title)
        .bind(&tour.description)
        .bind(&tour.short_description)
        .bind(tour.duration_minutes)
        .bind(tour.max_participants)
        .bind(tour.price_cents)
        .bind(&tour.image_url)
        .bind(&tour.gallery_images)
        .bind(&tour.features)
        .bind(tour.difficulty.as_str())
        .bind(tour.is_active)
        .bind(tour.updated_at)
        .bind(tour.id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("tour {}", tour.id)));
        }
        Ok(())
    }

    async fn find_tour(&self, id: Uuid) -> StoreResult<Option<Tour>> {
        let row = sqlx::query_as::<_, TourRow>(&format!("SELECT {} FROM tours WHERE id = $1", TOUR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.map(Tour::try_from).transpose()
    }

    async fn list_tours(&self, active_only: bool) -> StoreResult<Vec<Tour>> {
        let rows = sqlx::query_as::<_, TourRow>(&format!(
            "SELECT {} FROM tours WHERE ($1 = FALSE OR is_active) ORDER BY seq",
            TOUR_COLUMNS
        ))
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows.into_iter().map(Tour::try_from).collect()
    }
}
