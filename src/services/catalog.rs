use crate::clients::MetadataProvider;
use crate::config::Config;
use crate::db::{Store, StoreError};
use crate::domain::EpisodeId;
use crate::domain::events::CatalogEvent;
use crate::models::Series;
use crate::services::covers::CoverCache;
use crate::services::enricher::{EnrichReport, Enricher};
use crate::services::rate_limit::RateLimiter;
use crate::services::scanner::{LibraryScanner, ScanError, ScanReport};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Plays an episode. Only ever handed the file path.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, file_path: &Path);
}

/// Produces a preview image for an episode file, returning where it was
/// written, or nothing if no thumbnail could be made.
#[async_trait]
pub trait Thumbnailer: Send + Sync {
    async fn thumbnail(&self, file_path: &Path) -> Option<PathBuf>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No {0} is configured")]
    Unavailable(&'static str),
}

/// Entry point tying the store, the two background workers and the event
/// bus together.
pub struct Catalog {
    store: Store,
    scanner: Arc<LibraryScanner>,
    enricher: Option<Arc<Enricher>>,
    event_bus: broadcast::Sender<CatalogEvent>,
    playback: Option<Arc<dyn PlaybackSink>>,
    thumbnailer: Option<Arc<dyn Thumbnailer>>,
}

impl Catalog {
    /// Builds the catalog. Without a provider, enrichment is skipped.
    #[must_use]
    pub fn new(store: Store, config: &Config, provider: Option<Arc<dyn MetadataProvider>>) -> Self {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));

        let scanner = Arc::new(LibraryScanner::new(
            store.clone(),
            config.library.clone(),
            event_bus.clone(),
        ));

        let enricher = provider.map(|provider| {
            Arc::new(Enricher::new(
                store.clone(),
                provider,
                CoverCache::new(&config.metadata.covers_path),
                RateLimiter::new(Duration::from_millis(config.metadata.min_request_interval_ms)),
                event_bus.clone(),
            ))
        });

        Self {
            store,
            scanner,
            enricher,
            event_bus,
            playback: None,
            thumbnailer: None,
        }
    }

    #[must_use]
    pub fn with_playback(mut self, sink: Arc<dyn PlaybackSink>) -> Self {
        self.playback = Some(sink);
        self
    }

    #[must_use]
    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        self.thumbnailer = Some(thumbnailer);
        self
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.event_bus.subscribe()
    }

    pub async fn scan(&self, root: &Path, cancel: &CancellationToken) -> Result<ScanReport, ScanError> {
        self.scanner.scan(root, cancel).await
    }

    /// Enriches every pending series. Returns `None` when no provider is set.
    pub async fn enrich(&self, cancel: &CancellationToken) -> Result<Option<EnrichReport>, StoreError> {
        match &self.enricher {
            Some(enricher) => enricher.run(cancel).await.map(Some),
            None => Ok(None),
        }
    }

    /// Scans `root`, then starts enriching the series the scan touched in the
    /// background. The handle is `None` when nothing needs enriching.
    pub async fn scan_and_enrich(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<(ScanReport, Option<JoinHandle<Result<EnrichReport, StoreError>>>), ScanError> {
        let report = self.scanner.scan(root, cancel).await?;

        let Some(enricher) = self.enricher.clone() else {
            return Ok((report, None));
        };
        if report.cancelled || report.series_touched.is_empty() {
            return Ok((report, None));
        }

        let titles = report.series_touched.clone();
        let cancel = cancel.clone();
        debug!(count = titles.len(), "Spawning enrichment for touched series");
        let handle = tokio::spawn(async move { enricher.run_for_titles(&titles, &cancel).await });

        Ok((report, Some(handle)))
    }

    pub async fn library(&self) -> Result<Vec<Series>, StoreError> {
        self.store.all_series_with_episodes().await
    }

    /// Hands the episode's file to the playback collaborator.
    pub async fn request_playback(&self, episode_id: EpisodeId) -> Result<(), CatalogError> {
        let sink = self
            .playback
            .as_ref()
            .ok_or(CatalogError::Unavailable("playback sink"))?;
        let episode = self.find_episode(episode_id).await?;

        info!(
            event = "playback_requested",
            episode_id = episode_id.value(),
            path = %episode,
            "Starting playback"
        );
        sink.play(Path::new(&episode));
        Ok(())
    }

    /// Asks the thumbnailer for a preview and records the returned path.
    pub async fn request_thumbnail(&self, episode_id: EpisodeId) -> Result<Option<PathBuf>, CatalogError> {
        let thumbnailer = self
            .thumbnailer
            .as_ref()
            .ok_or(CatalogError::Unavailable("thumbnailer"))?;
        let episode = self.find_episode(episode_id).await?;

        let Some(thumbnail) = thumbnailer.thumbnail(Path::new(&episode)).await else {
            warn!(episode_id = episode_id.value(), path = %episode, "No thumbnail produced");
            return Ok(None);
        };

        self.store
            .set_episode_thumbnail(episode_id, &thumbnail.to_string_lossy())
            .await?;
        Ok(Some(thumbnail))
    }

    async fn find_episode(&self, episode_id: EpisodeId) -> Result<String, StoreError> {
        self.store
            .get_episode(episode_id)
            .await?
            .map(|e| e.file_path)
            .ok_or_else(|| StoreError::not_found("episode", episode_id))
    }
}
