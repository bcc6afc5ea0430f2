use riptide_core::{StoreError, TourRepository};
use riptide_shared::{Tour, TourDraft, TourPatch};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Catalog-related errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Tour not found: {0}")]
    NotFound(Uuid),

    #[error("Tour is not active: {0}")]
    Inactive(Uuid),

    #[error("Invalid tour: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry of offered tours.
///
/// Reads are side-effect free. Publishing, editing and deactivation are
/// administrative operations; tours are never deleted.
#[derive(Clone)]
pub struct TourCatalog {
    repo: Arc<dyn TourRepository>,
}

impl TourCatalog {
    pub fn new(repo: Arc<dyn TourRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_tour(&self, id: Uuid) -> Result<Tour, CatalogError> {
        self.repo.find_tour(id).await?.ok_or(CatalogError::NotFound(id))
    }

    /// Like [`get_tour`](Self::get_tour) but rejects deactivated tours
    pub async fn get_active_tour(&self, id: Uuid) -> Result<Tour, CatalogError> {
        let tour = self.get_tour(id).await?;
        if !tour.is_active {
            return Err(CatalogError::Inactive(id));
        }
        Ok(tour)
    }

    /// Active tours in the order they were published
    pub async fn list_active_tours(&self) -> Result<Vec<Tour>, CatalogError> {
        Ok(self.repo.list_tours(true).await?)
    }

    pub async fn list_all_tours(&self) -> Result<Vec<Tour>, CatalogError> {
        Ok(self.repo.list_tours(false).await?)
    }

    pub async fn publish(&self, draft: TourDraft) -> Result<Tour, CatalogError> {
        let tour = Tour::new(draft);
        validate(&tour)?;
        self.repo.insert_tour(&tour).await?;
        info!(tour_id = %tour.id, title = %tour.title, "tour published");
        Ok(tour)
    }

    pub async fn edit(&self, id: Uuid, patch: TourPatch) -> Result<Tour, CatalogError> {
        let mut tour = self.get_tour(id).await?;
        tour.apply(patch);
        validate(&tour)?;
        self.repo.update_tour(&tour).await?;
        info!(tour_id = %id, "tour edited");
        Ok(tour)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<Tour, CatalogError> {
        let mut tour = self.get_tour(id).await?;
        if tour.is_active {
            tour.deactivate();
            self.repo.update_tour(&tour).await?;
            info!(tour_id = %id, "tour deactivated");
        }
        Ok(tour)
    }
}

fn validate(tour: &Tour) -> Result<(), CatalogError> {
    if tour.title.trim().is_empty() {
        return Err(CatalogError::Invalid("title must not be empty".to_string()));
    }
    if tour.duration_minutes <= 0 {
        return Err(CatalogError::Invalid(format!(
            "duration_minutes must be positive, got {}",
            tour.duration_minutes
        )));
    }
    if tour.max_participants <= 0 {
        return Err(CatalogError::Invalid(format!(
            "max_participants must be positive, got {}",
            tour.max_participants
        )));
    }
    if tour.price_cents < 0 {
        return Err(CatalogError::Invalid(format!(
            "price_cents must not be negative, got {}",
            tour.price_cents
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use riptide_shared::Difficulty;
    use riptide_store::MemoryStore;

    fn draft(title: &str) -> TourDraft {
        TourDraft {
            title: title.to_string(),
            description: "Glide through golden waters".to_string(),
            short_description: String::new(),
            duration_minutes: 120,
            max_participants: 6,
            price_cents: 22_500,
            image_url: None,
            gallery_images: vec![],
            features: vec![],
            difficulty: Difficulty::Intermediate,
        }
    }

    fn catalog() -> TourCatalog {
        TourCatalog::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_list_active_tours_keeps_insertion_order() {
        let catalog = catalog();
        let a = catalog.publish(draft("Skyline")).await.unwrap();
        let b = catalog.publish(draft("Sunset")).await.unwrap();
        let c = catalog.publish(draft("Adrenaline")).await.unwrap();

        catalog.deactivate(b.id).await.unwrap();

        let ids: Vec<Uuid> = catalog.list_active_tours().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert_eq!(catalog.list_all_tours().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_active_lookup_rejects_inactive_tour() {
        let catalog = catalog();
        let tour = catalog.publish(draft("Sunset")).await.unwrap();
        catalog.deactivate(tour.id).await.unwrap();

        assert!(catalog.get_tour(tour.id).await.is_ok());
        assert!(matches!(
            catalog.get_active_tour(tour.id).await,
            Err(CatalogError::Inactive(id)) if id == tour.id
        ));
        assert!(matches!(
            catalog.get_tour(Uuid::new_v4()).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_validates_draft() {
        let catalog = catalog();

        let mut bad = draft("Zero");
        bad.max_participants = 0;
        assert!(matches!(catalog.publish(bad).await, Err(CatalogError::Invalid(_))));

        let mut bad = draft("Free ride");
        bad.duration_minutes = 0;
        assert!(matches!(catalog.publish(bad).await, Err(CatalogError::Invalid(_))));

        assert!(catalog.list_all_tours().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_edit_rejects_invalid_patch() {
        let catalog = catalog();
        let tour = catalog.publish(draft("Sunset")).await.unwrap();

        let result = catalog
            .edit(
                tour.id,
                TourPatch {
                    price_cents: Some(-5),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(CatalogError::Invalid(_))));
        assert_eq!(catalog.get_tour(tour.id).await.unwrap().price_cents, 22_500);
    }
}
