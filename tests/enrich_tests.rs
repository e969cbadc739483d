//! Metadata enrichment against an in-process provider.

use anicat::clients::{MetadataProvider, ProviderError, ProviderMatch};
use anicat::constants::NO_DESCRIPTION_PLACEHOLDER;
use anicat::db::Store;
use anicat::domain::events::CatalogEvent;
use anicat::services::{CoverCache, EnrichStatus, Enricher, RateLimiter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Reply {
    Found(ProviderMatch),
    NotFound,
    Fail,
}

#[derive(Default)]
struct FakeProvider {
    replies: HashMap<String, Reply>,
    image_fails: bool,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl FakeProvider {
    fn with(mut self, title: &str, reply: Reply) -> Self {
        self.replies.insert(title.to_string(), reply);
        self
    }

    fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    fn record(&self, what: String) {
        self.calls.lock().expect("lock poisoned").push((what, Instant::now()));
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    async fn search(&self, title: &str) -> Result<Option<ProviderMatch>, ProviderError> {
        self.record(format!("search:{title}"));
        match self.replies.get(title).cloned().unwrap_or(Reply::NotFound) {
            Reply::Found(found) => Ok(Some(found)),
            Reply::NotFound => Ok(None),
            Reply::Fail => Err(ProviderError::Timeout),
        }
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.record(format!("image:{url}"));
        if self.image_fails {
            Err(ProviderError::Status(404))
        } else {
            Ok(b"cover-bytes".to_vec())
        }
    }
}

fn found(id: i32, cover: Option<&str>) -> ProviderMatch {
    ProviderMatch {
        external_id: id,
        title: "Matched".to_string(),
        synopsis: Some("A synopsis.".to_string()),
        genres: vec!["Action".to_string(), "Drama".to_string()],
        cover_urls: cover.map(|c| vec![c.to_string()]).unwrap_or_default(),
        rating: Some(8.1),
    }
}

async fn temp_store() -> Store {
    let db_path = std::env::temp_dir().join(format!("anicat-enrich-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open store")
}

fn covers_dir() -> PathBuf {
    std::env::temp_dir().join(format!("anicat-enrich-covers-{}", uuid::Uuid::new_v4()))
}

fn enricher(
    store: &Store,
    provider: Arc<FakeProvider>,
    covers: &Path,
    interval: Duration,
) -> (Enricher, broadcast::Receiver<CatalogEvent>) {
    let (tx, rx) = broadcast::channel(256);
    let enricher = Enricher::new(
        store.clone(),
        provider,
        CoverCache::new(covers),
        RateLimiter::new(interval),
        tx,
    );
    (enricher, rx)
}

#[tokio::test]
async fn no_match_marks_series_attempted() {
    let store = temp_store().await;
    let (id, _) = store
        .get_or_create_series("Obscure Show", "/lib/Obscure Show")
        .await
        .expect("failed to create series");
    let provider = Arc::new(FakeProvider::default());
    let (enricher, _rx) = enricher(&store, provider.clone(), &covers_dir(), Duration::ZERO);
    let cancel = CancellationToken::new();

    let report = enricher.run(&cancel).await.expect("enrich failed");

    assert_eq!(report.count(EnrichStatus::NoMatch), 1);
    assert!(store.series_missing_metadata().await.expect("query failed").is_empty());
    let series = store.get_series(id).await.expect("query failed").expect("series missing");
    assert_eq!(series.description.as_deref(), Some(NO_DESCRIPTION_PLACEHOLDER));

    let again = enricher.run(&cancel).await.expect("second enrich failed");
    assert!(again.outcomes.is_empty());
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn provider_error_leaves_series_pending() {
    let store = temp_store().await;
    store
        .get_or_create_series("Flaky Show", "/lib/Flaky Show")
        .await
        .expect("failed to create series");
    let provider = Arc::new(FakeProvider::default().with("Flaky Show", Reply::Fail));
    let (enricher, mut rx) = enricher(&store, provider, &covers_dir(), Duration::ZERO);

    let report = enricher.run(&CancellationToken::new()).await.expect("enrich failed");

    assert_eq!(report.count(EnrichStatus::Failed), 1);
    assert_eq!(store.series_missing_metadata().await.expect("query failed").len(), 1);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(events.contains(&CatalogEvent::SeriesEnriched {
        title: "Flaky Show".to_string(),
        success: false,
    }));
    assert!(matches!(
        events.last(),
        Some(CatalogEvent::EnrichFinished { enriched: 0, failed: 1, cancelled: false })
    ));
}

#[tokio::test]
async fn match_stores_metadata_and_cover() {
    let store = temp_store().await;
    let (id, _) = store
        .get_or_create_series("Known Show", "/lib/Known Show")
        .await
        .expect("failed to create series");
    let provider = Arc::new(
        FakeProvider::default().with("Known Show", Reply::Found(found(7, Some("https://img.test/k.png")))),
    );
    let covers = covers_dir();
    let (enricher, _rx) = enricher(&store, provider, &covers, Duration::ZERO);

    let report = enricher.run(&CancellationToken::new()).await.expect("enrich failed");
    assert_eq!(report.count(EnrichStatus::Enriched), 1);

    let series = store.get_series(id).await.expect("query failed").expect("series missing");
    assert_eq!(series.description.as_deref(), Some("A synopsis."));
    assert_eq!(series.genres, vec!["Action", "Drama"]);
    assert_eq!(series.external_id, Some(7));
    assert!(series.metadata_fetched_at.is_some());

    let cover = PathBuf::from(series.cover_path.expect("cover missing"));
    assert!(cover.starts_with(&covers));
    assert_eq!(cover.extension().and_then(|e| e.to_str()), Some("png"));
    assert_eq!(std::fs::read(&cover).expect("cover not written"), b"cover-bytes");

    let _ = std::fs::remove_dir_all(covers);
}

#[tokio::test]
async fn same_cover_url_is_downloaded_once() {
    let store = temp_store().await;
    for title in ["Show One", "Show Two"] {
        store
            .get_or_create_series(title, &format!("/lib/{title}"))
            .await
            .expect("failed to create series");
    }
    let url = "https://img.test/shared.jpg";
    let provider = Arc::new(
        FakeProvider::default()
            .with("Show One", Reply::Found(found(1, Some(url))))
            .with("Show Two", Reply::Found(found(2, Some(url)))),
    );
    let covers = covers_dir();
    let (enricher, _rx) = enricher(&store, provider.clone(), &covers, Duration::ZERO);

    enricher.run(&CancellationToken::new()).await.expect("enrich failed");

    let downloads = provider
        .calls()
        .iter()
        .filter(|(what, _)| what.starts_with("image:"))
        .count();
    assert_eq!(downloads, 1);
    assert_eq!(std::fs::read_dir(&covers).expect("covers dir missing").count(), 1);

    let _ = std::fs::remove_dir_all(covers);
}

#[tokio::test]
async fn failed_cover_download_keeps_text_metadata() {
    let store = temp_store().await;
    let (id, _) = store
        .get_or_create_series("Known Show", "/lib/Known Show")
        .await
        .expect("failed to create series");
    let mut provider =
        FakeProvider::default().with("Known Show", Reply::Found(found(7, Some("https://img.test/k.jpg"))));
    provider.image_fails = true;
    let (enricher, _rx) = enricher(&store, Arc::new(provider), &covers_dir(), Duration::ZERO);

    let report = enricher.run(&CancellationToken::new()).await.expect("enrich failed");

    assert_eq!(report.count(EnrichStatus::Enriched), 1);
    let series = store.get_series(id).await.expect("query failed").expect("series missing");
    assert_eq!(series.description.as_deref(), Some("A synopsis."));
    assert!(series.cover_path.is_none());
}

#[tokio::test]
async fn existing_cover_is_kept() {
    let store = temp_store().await;
    let (id, _) = store
        .get_or_create_series("Known Show", "/lib/Known Show")
        .await
        .expect("failed to create series");
    store
        .set_series_cover_if_missing(id, "/lib/Known Show/cover.jpg")
        .await
        .expect("failed to set cover");
    let provider = Arc::new(
        FakeProvider::default().with("Known Show", Reply::Found(found(7, Some("https://img.test/k.jpg")))),
    );
    let (enricher, _rx) = enricher(&store, provider.clone(), &covers_dir(), Duration::ZERO);

    enricher.run(&CancellationToken::new()).await.expect("enrich failed");

    let series = store.get_series(id).await.expect("query failed").expect("series missing");
    assert_eq!(series.cover_path.as_deref(), Some("/lib/Known Show/cover.jpg"));
    assert!(provider.calls().iter().all(|(what, _)| !what.starts_with("image:")));
}

#[tokio::test]
async fn provider_calls_respect_minimum_interval() {
    let store = temp_store().await;
    for title in ["Alpha", "Beta", "Gamma"] {
        store
            .get_or_create_series(title, &format!("/lib/{title}"))
            .await
            .expect("failed to create series");
    }
    let provider = Arc::new(
        FakeProvider::default().with("Beta", Reply::Found(found(2, Some("https://img.test/b.jpg")))),
    );
    let interval = Duration::from_millis(150);
    let covers = covers_dir();
    let (enricher, _rx) = enricher(&store, provider.clone(), &covers, interval);

    enricher.run(&CancellationToken::new()).await.expect("enrich failed");

    let calls = provider.calls();
    // Three searches plus one cover download.
    assert_eq!(calls.len(), 4);
    for pair in calls.windows(2) {
        let gap = pair[1].1.duration_since(pair[0].1);
        assert!(
            gap >= interval - Duration::from_millis(5),
            "{} followed {} after {gap:?}",
            pair[1].0,
            pair[0].0
        );
    }

    let _ = std::fs::remove_dir_all(covers);
}

#[tokio::test]
async fn cancelled_run_starts_no_new_series() {
    let store = temp_store().await;
    for title in ["Alpha", "Beta"] {
        store
            .get_or_create_series(title, &format!("/lib/{title}"))
            .await
            .expect("failed to create series");
    }
    let provider = Arc::new(FakeProvider::default());
    let (enricher, mut rx) = enricher(&store, provider.clone(), &covers_dir(), Duration::from_secs(30));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let report = enricher.run(&cancel).await.expect("enrich failed");

    assert!(report.cancelled);
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(store.series_missing_metadata().await.expect("query failed").len(), 1);

    let mut last = None;
    while let Ok(event) = rx.try_recv() {
        last = Some(event);
    }
    assert!(matches!(last, Some(CatalogEvent::EnrichFinished { cancelled: true, .. })));
}
