use crate::clients::{MetadataProvider, ProviderMatch};
use crate::constants::{NO_DESCRIPTION_PLACEHOLDER, metrics as metric_names};
use crate::db::{Store, StoreError};
use crate::domain::events::CatalogEvent;
use crate::models::{Series, SeriesMetadata};
use crate::services::covers::CoverCache;
use crate::services::rate_limit::RateLimiter;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How a single series fared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichStatus {
    Enriched,
    /// The provider answered without a result. The series is marked
    /// attempted and not queued again.
    NoMatch,
    /// Network or storage failure. The series stays queued for a later run.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichOutcome {
    pub title: String,
    pub status: EnrichStatus,
}

impl EnrichOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == EnrichStatus::Enriched
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnrichReport {
    pub outcomes: Vec<EnrichOutcome>,
    pub cancelled: bool,
}

impl EnrichReport {
    #[must_use]
    pub fn count(&self, status: EnrichStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Fills in synopsis, genres and covers for series the provider has never
/// been asked about. Series are handled one after another with every network
/// call spaced by the rate limiter.
pub struct Enricher {
    store: Store,
    provider: Arc<dyn MetadataProvider>,
    covers: CoverCache,
    limiter: RateLimiter,
    event_bus: broadcast::Sender<CatalogEvent>,
}

impl Enricher {
    #[must_use]
    pub const fn new(
        store: Store,
        provider: Arc<dyn MetadataProvider>,
        covers: CoverCache,
        limiter: RateLimiter,
        event_bus: broadcast::Sender<CatalogEvent>,
    ) -> Self {
        Self {
            store,
            provider,
            covers,
            limiter,
            event_bus,
        }
    }

    /// Enriches every series still missing metadata.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<EnrichReport, StoreError> {
        let pending = match self.store.series_missing_metadata().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(event = "enrich_failed", error = %e, "Failed to load pending series");
                self.finish(&EnrichReport::default());
                return Err(e);
            }
        };
        Ok(self.enrich_all(pending, cancel).await)
    }

    /// Like [`Self::run`], restricted to the given titles.
    pub async fn run_for_titles(
        &self,
        titles: &[String],
        cancel: &CancellationToken,
    ) -> Result<EnrichReport, StoreError> {
        let pending = match self.store.series_missing_metadata().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(event = "enrich_failed", error = %e, "Failed to load pending series");
                self.finish(&EnrichReport::default());
                return Err(e);
            }
        };
        let pending = pending
            .into_iter()
            .filter(|s| titles.iter().any(|t| t == &s.title))
            .collect();
        Ok(self.enrich_all(pending, cancel).await)
    }

    async fn enrich_all(&self, pending: Vec<Series>, cancel: &CancellationToken) -> EnrichReport {
        let start = std::time::Instant::now();
        let mut report = EnrichReport::default();

        let _ = self.event_bus.send(CatalogEvent::EnrichStarted {
            pending: pending.len(),
        });
        info!(event = "enrich_started", pending = pending.len(), "Enriching series metadata");

        for series in &pending {
            if cancel.is_cancelled() || !self.limiter.wait(cancel).await {
                report.cancelled = true;
                break;
            }

            let status = self.enrich_one(series, cancel).await;
            let outcome = EnrichOutcome {
                title: series.title.clone(),
                status,
            };
            let _ = self.event_bus.send(CatalogEvent::SeriesEnriched {
                title: outcome.title.clone(),
                success: outcome.success(),
            });
            report.outcomes.push(outcome);
        }

        info!(
            event = "enrich_finished",
            enriched = report.count(EnrichStatus::Enriched),
            no_match = report.count(EnrichStatus::NoMatch),
            failed = report.count(EnrichStatus::Failed),
            cancelled = report.cancelled,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Metadata enrichment completed"
        );
        self.finish(&report);

        report
    }

    fn finish(&self, report: &EnrichReport) {
        let _ = self.event_bus.send(CatalogEvent::EnrichFinished {
            enriched: report.count(EnrichStatus::Enriched),
            failed: report.outcomes.len() - report.count(EnrichStatus::Enriched),
            cancelled: report.cancelled,
        });
    }

    /// Runs once the limiter has granted the search request.
    async fn enrich_one(&self, series: &Series, cancel: &CancellationToken) -> EnrichStatus {
        metrics::counter!(metric_names::ENRICH_REQUESTS_TOTAL).increment(1);

        let found = match self.provider.search(&series.title).await {
            Ok(found) => found,
            Err(e) => {
                warn!(title = %series.title, error = %e, "Metadata lookup failed");
                metrics::counter!(metric_names::ENRICH_FAILURES_TOTAL).increment(1);
                return EnrichStatus::Failed;
            }
        };

        let Some(found) = found else {
            debug!(title = %series.title, "No metadata match");
            return match self
                .store
                .mark_metadata_attempted(series.id, NO_DESCRIPTION_PLACEHOLDER)
                .await
            {
                Ok(()) => EnrichStatus::NoMatch,
                Err(e) => {
                    error!(title = %series.title, error = %e, "Failed to mark series attempted");
                    EnrichStatus::Failed
                }
            };
        };

        let cover_path = if series.cover_path.is_some() {
            None
        } else {
            self.cache_cover(&series.title, &found, cancel).await
        };

        let metadata = SeriesMetadata {
            cover_path,
            description: Some(
                found
                    .synopsis
                    .clone()
                    .unwrap_or_else(|| NO_DESCRIPTION_PLACEHOLDER.to_string()),
            ),
            genres: found.genres.clone(),
            external_id: Some(found.external_id),
            rating: found.rating,
        };

        match self.store.update_series_metadata(series.id, &metadata).await {
            Ok(()) => {
                info!(
                    event = "series_enriched",
                    title = %series.title,
                    external_id = found.external_id,
                    cover = metadata.cover_path.is_some(),
                    "Series metadata updated"
                );
                EnrichStatus::Enriched
            }
            Err(e) => {
                error!(title = %series.title, error = %e, "Failed to store series metadata");
                EnrichStatus::Failed
            }
        }
    }

    /// Downloads the best cover into the cache. Any failure leaves the cover
    /// absent without affecting the text metadata.
    async fn cache_cover(
        &self,
        title: &str,
        found: &ProviderMatch,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let url = found.best_cover()?;

        if let Some(path) = self.covers.lookup(url).await {
            return Some(path.to_string_lossy().into_owned());
        }

        if !self.limiter.wait(cancel).await {
            return None;
        }
        metrics::counter!(metric_names::ENRICH_REQUESTS_TOTAL).increment(1);

        let bytes = match self.provider.fetch_image(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(title, url, error = %e, "Cover download failed");
                metrics::counter!(metric_names::ENRICH_FAILURES_TOTAL).increment(1);
                return None;
            }
        };

        match self.covers.store(url, &bytes).await {
            Ok(path) => Some(path.to_string_lossy().into_owned()),
            Err(e) => {
                warn!(title, url, error = %e, "Failed to write cover");
                None
            }
        }
    }
}
