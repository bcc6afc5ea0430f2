use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// Skill level a rider needs for a tour
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl FromStr for Difficulty {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(UnknownVariant {
                kind: "difficulty",
                value: other.to_string(),
            }),
        }
    }
}

/// A tour product offered in the catalog.
///
/// Prices are held in minor currency units (cents). Tours are never deleted,
/// only deactivated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tour {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub short_description: String,
    pub duration_minutes: i32,
    pub max_participants: i32,
    pub price_cents: i64,
    pub image_url: Option<String>,
    pub gallery_images: Vec<String>,
    pub features: Vec<String>,
    pub difficulty: Difficulty,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    pub fn new(draft: TourDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            short_description: draft.short_description,
            duration_minutes: draft.duration_minutes,
            max_participants: draft.max_participants,
            price_cents: draft.price_cents,
            image_url: draft.image_url,
            gallery_images: draft.gallery_images,
            features: draft.features,
            difficulty: draft.difficulty,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an administrative edit. Fields left as `None` are kept.
    pub fn apply(&mut self, patch: TourPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(short_description) = patch.short_description {
            self.short_description = short_description;
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(max) = patch.max_participants {
            self.max_participants = max;
        }
        if let Some(price) = patch.price_cents {
            self.price_cents = price;
        }
        if let Some(image_url) = patch.image_url {
            self.image_url = Some(image_url);
        }
        if let Some(gallery) = patch.gallery_images {
            self.gallery_images = gallery;
        }
        if let Some(features) = patch.features {
            self.features = features;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        self.updated_at = Utc::now();
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

/// Input for publishing a new tour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    pub duration_minutes: i32,
    pub max_participants: i32,
    pub price_cents: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub gallery_images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TourPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub max_participants: Option<i32>,
    pub price_cents: Option<i64>,
    pub image_url: Option<String>,
    pub gallery_images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    pub difficulty: Option<Difficulty>,
}
