use serde::{Deserialize, Serialize};

use super::episode::Episode;
use crate::domain::SeriesId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    pub title: String,
    pub path: String,
    pub cover_path: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub external_id: Option<i32>,
    pub rating: Option<f32>,
    pub metadata_fetched_at: Option<String>,
    /// Empty unless loaded through an eager listing.
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

impl Series {
    #[must_use]
    pub fn watched_count(&self) -> usize {
        self.episodes.iter().filter(|e| e.progress.is_watched).count()
    }
}

/// Provider data merged into a series by the enricher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesMetadata {
    /// Only overwrites the stored cover when present.
    pub cover_path: Option<String>,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub external_id: Option<i32>,
    pub rating: Option<f32>,
}
