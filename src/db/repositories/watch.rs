use crate::db::error::StoreResult;
use crate::domain::EpisodeId;
use crate::entities::{prelude::*, watch_progress};
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

/// Playback state written on behalf of the player collaborator.
pub struct WatchRepository {
    conn: DatabaseConnection,
}

impl WatchRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Sets the watched flag; marking watched also stamps `last_watched`.
    pub async fn set_watched(&self, episode_id: EpisodeId, watched: bool) -> StoreResult<()> {
        let now = chrono::Utc::now().to_rfc3339();

        let active_model = watch_progress::ActiveModel {
            episode_id: Set(episode_id.value()),
            progress_seconds: Set(0.0),
            is_watched: Set(watched),
            last_watched: Set(watched.then_some(now)),
            ..Default::default()
        };

        let mut columns = vec![watch_progress::Column::IsWatched];
        if watched {
            columns.push(watch_progress::Column::LastWatched);
        }

        WatchProgress::insert(active_model)
            .on_conflict(
                OnConflict::column(watch_progress::Column::EpisodeId)
                    .update_columns(columns)
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }

    /// Records a playback position. `finished` marks the episode watched but
    /// an unfinished report never clears an earlier watched flag.
    pub async fn update_progress(
        &self,
        episode_id: EpisodeId,
        progress_seconds: f32,
        finished: bool,
    ) -> StoreResult<()> {
        let active_model = watch_progress::ActiveModel {
            episode_id: Set(episode_id.value()),
            progress_seconds: Set(progress_seconds.max(0.0)),
            is_watched: Set(finished),
            last_watched: Set(Some(chrono::Utc::now().to_rfc3339())),
            ..Default::default()
        };

        let mut columns = vec![
            watch_progress::Column::ProgressSeconds,
            watch_progress::Column::LastWatched,
        ];
        if finished {
            columns.push(watch_progress::Column::IsWatched);
        }

        WatchProgress::insert(active_model)
            .on_conflict(
                OnConflict::column(watch_progress::Column::EpisodeId)
                    .update_columns(columns)
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }
}
