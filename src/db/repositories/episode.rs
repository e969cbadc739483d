use crate::db::error::{StoreError, StoreResult};
use crate::domain::{EpisodeId, SeriesId, UpsertOutcome};
use crate::entities::{episodes, prelude::*, watch_progress};
use crate::models::{Episode, EpisodeInput, WatchState};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

/// Repository for episode rows. Watch progress lives in its own table and is
/// never written from here.
pub struct EpisodeRepository {
    conn: DatabaseConnection,
}

impl EpisodeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub(crate) fn map_model(m: episodes::Model, progress: Option<watch_progress::Model>) -> Episode {
        Episode {
            id: EpisodeId::new(m.id),
            series_id: SeriesId::new(m.series_id),
            file_path: m.file_path,
            content_hash: m.content_hash,
            season: m.season,
            episode_number: m.episode_number,
            sub_series_title: m.sub_series_title,
            title: m.title,
            duration_secs: m.duration_secs,
            thumbnail_path: m.thumbnail_path,
            added_at: m.added_at,
            progress: progress
                .map(|p| WatchState {
                    progress_seconds: p.progress_seconds,
                    is_watched: p.is_watched,
                    last_watched: p.last_watched,
                })
                .unwrap_or_default(),
        }
    }

    pub async fn find_by_path(&self, file_path: &str) -> StoreResult<Option<episodes::Model>> {
        Ok(Episodes::find()
            .filter(episodes::Column::FilePath.eq(file_path))
            .one(&self.conn)
            .await?)
    }

    pub async fn get(&self, id: EpisodeId) -> StoreResult<Option<Episode>> {
        let row = Episodes::find_by_id(id.value())
            .find_also_related(WatchProgress)
            .one(&self.conn)
            .await?;

        Ok(row.map(|(episode, progress)| Self::map_model(episode, progress)))
    }

    /// Inserts or refreshes the row for `input.file_path`.
    ///
    /// Scan-derived columns are overwritten; watch progress is left alone. A
    /// missing content hash in `input` keeps the stored one.
    pub async fn upsert(&self, series_id: SeriesId, input: &EpisodeInput) -> StoreResult<UpsertOutcome> {
        let Some(existing) = self.find_by_path(&input.file_path).await? else {
            let model = episodes::ActiveModel {
                series_id: Set(series_id.value()),
                file_path: Set(input.file_path.clone()),
                content_hash: Set(input.content_hash.clone()),
                season: Set(input.season),
                episode_number: Set(input.episode_number),
                sub_series_title: Set(input.sub_series_title.clone()),
                title: Set(input.title.clone()),
                added_at: Set(chrono::Utc::now().to_rfc3339()),
                ..Default::default()
            }
            .insert(&self.conn)
            .await?;

            return Ok(UpsertOutcome::Inserted(EpisodeId::new(model.id)));
        };

        let content_hash = input
            .content_hash
            .clone()
            .or_else(|| existing.content_hash.clone());

        let unchanged = existing.series_id == series_id.value()
            && existing.season == input.season
            && existing.episode_number == input.episode_number
            && existing.sub_series_title == input.sub_series_title
            && existing.title == input.title
            && existing.content_hash == content_hash;

        let id = EpisodeId::new(existing.id);
        if unchanged {
            return Ok(UpsertOutcome::Unchanged(id));
        }

        episodes::ActiveModel {
            id: Set(existing.id),
            series_id: Set(series_id.value()),
            content_hash: Set(content_hash),
            season: Set(input.season),
            episode_number: Set(input.episode_number),
            sub_series_title: Set(input.sub_series_title.clone()),
            title: Set(input.title.clone()),
            ..Default::default()
        }
        .update(&self.conn)
        .await?;

        Ok(UpsertOutcome::Updated(id))
    }

    /// Episodes sharing `content_hash`, excluding the row stored at `except_path`.
    pub async fn find_by_hash(&self, content_hash: &str, except_path: &str) -> StoreResult<Vec<episodes::Model>> {
        Ok(Episodes::find()
            .filter(episodes::Column::ContentHash.eq(content_hash))
            .filter(episodes::Column::FilePath.ne(except_path))
            .all(&self.conn)
            .await?)
    }

    pub async fn set_thumbnail(&self, id: EpisodeId, thumbnail_path: &str) -> StoreResult<()> {
        self.update_column(id, episodes::ActiveModel {
            id: Set(id.value()),
            thumbnail_path: Set(Some(thumbnail_path.to_string())),
            ..Default::default()
        })
        .await
    }

    pub async fn set_duration(&self, id: EpisodeId, duration_secs: f32) -> StoreResult<()> {
        self.update_column(id, episodes::ActiveModel {
            id: Set(id.value()),
            duration_secs: Set(Some(duration_secs)),
            ..Default::default()
        })
        .await
    }

    async fn update_column(&self, id: EpisodeId, model: episodes::ActiveModel) -> StoreResult<()> {
        match model.update(&self.conn).await {
            Ok(_) => Ok(()),
            Err(sea_orm::DbErr::RecordNotUpdated) => Err(StoreError::not_found("episode", id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Watch state rows keyed by episode id.
    pub async fn progress_for(
        &self,
        episode_ids: &[i32],
    ) -> StoreResult<HashMap<i32, watch_progress::Model>> {
        if episode_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = WatchProgress::find()
            .filter(watch_progress::Column::EpisodeId.is_in(episode_ids.iter().copied()))
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(|p| (p.episode_id, p)).collect())
    }

    pub async fn list_under(&self, root_prefix: &str) -> StoreResult<Vec<episodes::Model>> {
        Ok(Episodes::find()
            .filter(episodes::Column::FilePath.starts_with(root_prefix))
            .order_by_asc(episodes::Column::FilePath)
            .all(&self.conn)
            .await?)
    }

    pub async fn delete_many(&self, ids: &[i32]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = Episodes::delete_many()
            .filter(episodes::Column::Id.is_in(ids.iter().copied()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
