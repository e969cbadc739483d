use serde::{Deserialize, Serialize};

use crate::domain::{EpisodeId, SeriesId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub series_id: SeriesId,
    pub file_path: String,
    pub content_hash: Option<String>,
    pub season: i32,
    pub episode_number: Option<i32>,
    pub sub_series_title: Option<String>,
    pub title: Option<String>,
    pub duration_secs: Option<f32>,
    pub thumbnail_path: Option<String>,
    pub added_at: String,
    pub progress: WatchState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchState {
    pub progress_seconds: f32,
    pub is_watched: bool,
    pub last_watched: Option<String>,
}

/// What a scan learned about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInput {
    pub file_path: String,
    pub content_hash: Option<String>,
    pub season: i32,
    pub episode_number: Option<i32>,
    pub sub_series_title: Option<String>,
    pub title: Option<String>,
}
