use crate::config::GeneralConfig;
use crate::domain::{EpisodeId, SeriesId, UpsertOutcome};
use crate::models::{Episode, EpisodeInput, Series, SeriesMetadata};
use crate::parser::natural_cmp;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::cmp::Ordering;
use std::path::{MAIN_SEPARATOR, Path};
use std::time::Duration;
use tracing::info;

pub mod error;
pub mod migrator;
pub mod repositories;

pub use error::{StoreError, StoreResult};

/// The catalog store. Cheap to clone; all clones share one connection pool.
///
/// Every write is a single short statement (or a single transaction for the
/// legacy import), so the scanner and the enricher can write concurrently.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn open(config: &GeneralConfig) -> StoreResult<Self> {
        Self::with_pool_options(
            &config.database_path,
            config.max_db_connections,
            config.min_db_connections,
        )
        .await
    }

    pub async fn new(db_url: &str) -> StoreResult<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> StoreResult<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");
        if !in_memory {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        if !in_memory {
            conn.execute_unprepared("PRAGMA journal_mode=WAL").await?;
        }

        migrator::Migrator::up(&conn, None)
            .await
            .map_err(StoreError::Migration)?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn series_repo(&self) -> repositories::series::SeriesRepository {
        repositories::series::SeriesRepository::new(self.conn.clone())
    }

    fn episode_repo(&self) -> repositories::episode::EpisodeRepository {
        repositories::episode::EpisodeRepository::new(self.conn.clone())
    }

    fn watch_repo(&self) -> repositories::watch::WatchRepository {
        repositories::watch::WatchRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Series
    // ========================================================================

    /// Get-or-create by exact title. The flag is true when the series is new.
    pub async fn get_or_create_series(&self, title: &str, path: &str) -> StoreResult<(SeriesId, bool)> {
        self.series_repo().get_or_create(title, path).await
    }

    pub async fn set_series_cover_if_missing(&self, id: SeriesId, cover_path: &str) -> StoreResult<bool> {
        self.series_repo().set_cover_if_missing(id, cover_path).await
    }

    pub async fn update_series_metadata(&self, id: SeriesId, metadata: &SeriesMetadata) -> StoreResult<()> {
        self.series_repo().update_metadata(id, metadata).await
    }

    pub async fn mark_metadata_attempted(&self, id: SeriesId, placeholder: &str) -> StoreResult<()> {
        self.series_repo().mark_attempted(id, placeholder).await
    }

    pub async fn series_missing_metadata(&self) -> StoreResult<Vec<Series>> {
        self.series_repo().missing_metadata().await
    }

    pub async fn get_series(&self, id: SeriesId) -> StoreResult<Option<Series>> {
        self.series_repo().get(id).await
    }

    pub async fn search_series(&self, query: &str) -> StoreResult<Vec<Series>> {
        self.series_repo().search(query).await
    }

    /// Every series with its episodes and watch state, titles ascending and
    /// episodes in viewing order.
    pub async fn all_series_with_episodes(&self) -> StoreResult<Vec<Series>> {
        let rows = self.series_repo().list_with_episodes().await?;

        let episode_ids: Vec<i32> = rows
            .iter()
            .flat_map(|(_, episodes)| episodes.iter().map(|e| e.id))
            .collect();
        let mut progress = self.episode_repo().progress_for(&episode_ids).await?;

        Ok(rows
            .into_iter()
            .map(|(series, episodes)| {
                let mut series = repositories::series::SeriesRepository::map_model(series);
                series.episodes = episodes
                    .into_iter()
                    .map(|e| {
                        let state = progress.remove(&e.id);
                        repositories::episode::EpisodeRepository::map_model(e, state)
                    })
                    .collect();
                series.episodes.sort_by(viewing_order);
                series
            })
            .collect())
    }

    // ========================================================================
    // Episodes
    // ========================================================================

    pub async fn upsert_episode(&self, series_id: SeriesId, input: &EpisodeInput) -> StoreResult<UpsertOutcome> {
        self.episode_repo().upsert(series_id, input).await
    }

    pub async fn get_episode(&self, id: EpisodeId) -> StoreResult<Option<Episode>> {
        self.episode_repo().get(id).await
    }

    pub async fn find_episodes_by_hash(&self, content_hash: &str, except_path: &str) -> StoreResult<Vec<Episode>> {
        let rows = self.episode_repo().find_by_hash(content_hash, except_path).await?;
        Ok(rows
            .into_iter()
            .map(|e| repositories::episode::EpisodeRepository::map_model(e, None))
            .collect())
    }

    pub async fn set_episode_thumbnail(&self, id: EpisodeId, thumbnail_path: &str) -> StoreResult<()> {
        self.episode_repo().set_thumbnail(id, thumbnail_path).await
    }

    pub async fn set_episode_duration(&self, id: EpisodeId, duration_secs: f32) -> StoreResult<()> {
        self.episode_repo().set_duration(id, duration_secs).await
    }

    // ========================================================================
    // Watch state
    // ========================================================================

    pub async fn set_watched(&self, file_path: &str, watched: bool) -> StoreResult<()> {
        let id = self.episode_id_for_path(file_path).await?;
        self.watch_repo().set_watched(id, watched).await
    }

    pub async fn update_progress(&self, file_path: &str, progress_seconds: f32, finished: bool) -> StoreResult<()> {
        let id = self.episode_id_for_path(file_path).await?;
        self.watch_repo()
            .update_progress(id, progress_seconds, finished)
            .await
    }

    async fn episode_id_for_path(&self, file_path: &str) -> StoreResult<EpisodeId> {
        self.episode_repo()
            .find_by_path(file_path)
            .await?
            .map(|e| EpisodeId::new(e.id))
            .ok_or_else(|| StoreError::not_found("episode", file_path))
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Deletes episodes under `root` whose file is gone, then series under
    /// `root` whose folder is gone or that have no episodes left. Returns the
    /// number of deleted rows.
    ///
    /// Refuses to run when `root` itself is unreachable, so an unmounted drive
    /// never empties the catalog.
    pub async fn prune_missing(&self, root: &Path) -> StoreResult<u64> {
        let root = match tokio::fs::canonicalize(root).await {
            Ok(path) if path.is_dir() => path,
            _ => return Err(StoreError::RootUnavailable(root.display().to_string())),
        };
        let prefix = root_prefix(&root);

        let mut missing_episodes = Vec::new();
        for episode in self.episode_repo().list_under(&prefix).await? {
            let path = Path::new(&episode.file_path);
            // LIKE treats '_' as a wildcard; re-check the prefix on real paths.
            if path.starts_with(&root) && !exists(path).await {
                missing_episodes.push(episode.id);
            }
        }
        let episodes_removed = self.episode_repo().delete_many(&missing_episodes).await?;

        let mut missing_series = Vec::new();
        for series in self.series_repo().list_under(&prefix).await? {
            let path = Path::new(&series.path);
            if !path.starts_with(&root) {
                continue;
            }
            let empty = self
                .series_repo()
                .episode_count(SeriesId::new(series.id))
                .await?
                == 0;
            if empty || !exists(path).await {
                missing_series.push(series.id);
            }
        }
        let series_removed = self.series_repo().delete_many(&missing_series).await?;

        info!(
            event = "library_prune_finished",
            root = %root.display(),
            episodes_removed,
            series_removed,
            "Pruned missing catalog entries"
        );

        Ok(episodes_removed + series_removed)
    }
}

fn root_prefix(root: &Path) -> String {
    let mut prefix = root.to_string_lossy().into_owned();
    if !prefix.ends_with(MAIN_SEPARATOR) {
        prefix.push(MAIN_SEPARATOR);
    }
    prefix
}

/// Errors other than "not found" count as present.
async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(true)
}

fn viewing_order(a: &Episode, b: &Episode) -> Ordering {
    a.sub_series_title
        .is_some()
        .cmp(&b.sub_series_title.is_some())
        .then_with(|| {
            natural_cmp(
                a.sub_series_title.as_deref().unwrap_or_default(),
                b.sub_series_title.as_deref().unwrap_or_default(),
            )
        })
        .then_with(|| a.season.cmp(&b.season))
        .then_with(|| match (a.episode_number, b.episode_number) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| natural_cmp(&a.file_path, &b.file_path))
}
