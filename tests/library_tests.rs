//! Scanning, watch state and pruning against real directory trees.

use anicat::config::LibraryConfig;
use anicat::db::{Store, StoreError};
use anicat::domain::events::CatalogEvent;
use anicat::services::LibraryScanner;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

async fn temp_store() -> Store {
    let db_path = std::env::temp_dir().join(format!("anicat-library-test-{}.db", uuid::Uuid::new_v4()));
    Store::new(&format!("sqlite:{}", db_path.display()))
        .await
        .expect("failed to open store")
}

/// Library root with two series, canonicalized like the scanner stores it.
fn temp_library() -> PathBuf {
    let root = std::env::temp_dir().join(format!("anicat-library-{}", uuid::Uuid::new_v4()));
    write_video(&root.join("Series A").join("Series A - 01.mkv"), b"series a episode one");
    write_video(&root.join("Series A").join("Series A - 02.mkv"), b"series a episode two");
    write_video(
        &root.join("Other Show").join("Season 2").join("Other.Show.S02E03.1080p.mkv"),
        b"other show s2e3",
    );
    write_video(&root.join("Other Show").join("Extras").join("Interview.mkv"), b"extra");
    std::fs::write(root.join("Series A").join("notes.txt"), b"not a video").expect("failed to write file");
    std::fs::canonicalize(&root).expect("failed to canonicalize root")
}

fn write_video(path: &Path, content: &[u8]) {
    std::fs::create_dir_all(path.parent().expect("file has parent")).expect("failed to create dir");
    std::fs::write(path, content).expect("failed to write file");
}

fn scanner(store: &Store) -> (LibraryScanner, broadcast::Receiver<CatalogEvent>) {
    let (tx, rx) = broadcast::channel(256);
    (LibraryScanner::new(store.clone(), LibraryConfig::default(), tx), rx)
}

async fn episode_count(store: &Store) -> usize {
    store
        .all_series_with_episodes()
        .await
        .expect("failed to list library")
        .iter()
        .map(|s| s.episodes.len())
        .sum()
}

#[tokio::test]
async fn scan_indexes_series_and_episodes() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);

    let report = scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");

    assert_eq!(report.episodes_added, 3);
    assert!(report.errors.is_empty());
    assert!(!report.cancelled);

    let library = store.all_series_with_episodes().await.expect("failed to list library");
    let titles: Vec<&str> = library.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["Other Show", "Series A"]);

    let other = &library[0];
    assert_eq!(other.episodes.len(), 1);
    assert_eq!(other.episodes[0].season, 2);
    assert_eq!(other.episodes[0].episode_number, Some(3));
    assert_eq!(other.episodes[0].sub_series_title.as_deref(), Some("Season 2"));

    let series_a = &library[1];
    let numbers: Vec<Option<i32>> = series_a.episodes.iter().map(|e| e.episode_number).collect();
    assert_eq!(numbers, vec![Some(1), Some(2)]);
    assert!(series_a.episodes.iter().all(|e| e.season == 1));
    assert!(series_a.episodes.iter().all(|e| e.content_hash.is_some()));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn rescan_of_unchanged_tree_adds_nothing() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);
    let cancel = CancellationToken::new();

    let first = scanner.scan(&root, &cancel).await.expect("first scan failed");
    let count_after_first = episode_count(&store).await;

    let second = scanner.scan(&root, &cancel).await.expect("second scan failed");

    assert_eq!(first.episodes_added, 3);
    assert_eq!(second.episodes_added, 0);
    assert_eq!(second.episodes_updated, 0);
    assert!(second.series_touched.is_empty());
    assert_eq!(episode_count(&store).await, count_after_first);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn rescan_keeps_watch_state() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);
    let cancel = CancellationToken::new();

    scanner.scan(&root, &cancel).await.expect("scan failed");

    let watched = root.join("Series A").join("Series A - 01.mkv");
    let watched = watched.to_string_lossy();
    store.set_watched(&watched, true).await.expect("failed to mark watched");
    store
        .update_progress(&watched, 42.5, false)
        .await
        .expect("failed to record progress");

    scanner.scan(&root, &cancel).await.expect("rescan failed");

    let library = store.all_series_with_episodes().await.expect("failed to list library");
    let episode = library
        .iter()
        .flat_map(|s| s.episodes.iter())
        .find(|e| e.file_path == watched)
        .expect("episode missing after rescan");

    assert!(episode.progress.is_watched);
    assert!(episode.progress.last_watched.is_some());
    assert!((episode.progress.progress_seconds - 42.5).abs() < f32::EPSILON);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn set_watched_on_unknown_path_is_not_found() {
    let store = temp_store().await;

    let result = store.set_watched("/nowhere/missing.mkv", true).await;

    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn scan_emits_one_terminal_event_last() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, mut rx) = scanner(&store);

    scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(CatalogEvent::ScanStarted { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(matches!(
        events.last(),
        Some(CatalogEvent::ScanFinished { episodes_added: 3, cancelled: false, .. })
    ));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CatalogEvent::SeriesDiscovered { .. }))
            .count(),
        2
    );

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn scan_of_missing_root_fails_with_terminal_event() {
    let store = temp_store().await;
    let (scanner, mut rx) = scanner(&store);
    let missing = std::env::temp_dir().join(format!("anicat-missing-{}", uuid::Uuid::new_v4()));

    let result = scanner.scan(&missing, &CancellationToken::new()).await;

    assert!(result.is_err());
    assert!(matches!(rx.try_recv(), Ok(CatalogEvent::ScanFailed { .. })));
}

#[tokio::test]
async fn cancelled_scan_reports_cancellation() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = scanner.scan(&root, &cancel).await.expect("scan failed");

    assert!(report.cancelled);
    assert_eq!(report.episodes_added, 0);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn direct_episodes_get_season_zero_next_to_sub_series() {
    let store = temp_store().await;
    let root = std::env::temp_dir().join(format!("anicat-library-{}", uuid::Uuid::new_v4()));
    write_video(&root.join("Show").join("Show - 05.mkv"), b"direct");
    write_video(&root.join("Show").join("Movies").join("Show Movie.mkv"), b"movie");
    let root = std::fs::canonicalize(&root).expect("failed to canonicalize root");
    let (scanner, _rx) = scanner(&store);

    scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");

    let library = store.all_series_with_episodes().await.expect("failed to list library");
    assert_eq!(library.len(), 1);
    let episodes = &library[0].episodes;

    let direct = episodes
        .iter()
        .find(|e| e.sub_series_title.is_none())
        .expect("direct episode missing");
    assert_eq!(direct.season, 0);
    assert_eq!(direct.episode_number, Some(5));

    let movie = episodes
        .iter()
        .find(|e| e.sub_series_title.as_deref() == Some("Movies"))
        .expect("movie missing");
    assert_eq!(movie.episode_number, Some(1));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn moved_file_is_detected_by_content() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);
    let cancel = CancellationToken::new();

    scanner.scan(&root, &cancel).await.expect("scan failed");

    let old = root.join("Series A").join("Series A - 02.mkv");
    let new = root.join("Series A").join("Series A - 02 (renamed).mkv");
    std::fs::rename(&old, &new).expect("failed to rename");

    let report = scanner.scan(&root, &cancel).await.expect("rescan failed");
    assert_eq!(report.episodes_added, 1);
    assert_eq!(report.moved, 1);

    let removed = store.prune_missing(&root).await.expect("prune failed");
    assert_eq!(removed, 1);
    assert_eq!(episode_count(&store).await, 3);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn prune_removes_vanished_episodes_and_series() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);

    scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");

    std::fs::remove_file(root.join("Series A").join("Series A - 01.mkv")).expect("failed to delete");
    std::fs::remove_dir_all(root.join("Other Show")).expect("failed to delete");

    let removed = store.prune_missing(&root).await.expect("prune failed");

    // Two episodes plus the "Other Show" series.
    assert_eq!(removed, 3);
    let library = store.all_series_with_episodes().await.expect("failed to list library");
    assert_eq!(library.len(), 1);
    assert_eq!(library[0].title, "Series A");
    assert_eq!(library[0].episodes.len(), 1);

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn prune_refuses_unreachable_root() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);

    scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");
    std::fs::remove_dir_all(&root).expect("failed to delete root");

    let result = store.prune_missing(&root).await;

    assert!(matches!(result, Err(StoreError::RootUnavailable(_))));
    assert_eq!(episode_count(&store).await, 3);
}

#[tokio::test]
async fn local_cover_is_recorded() {
    let store = temp_store().await;
    let root = temp_library();
    std::fs::write(root.join("Series A").join("cover.jpg"), b"jpeg").expect("failed to write cover");
    let (scanner, _rx) = scanner(&store);

    scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");

    let library = store.all_series_with_episodes().await.expect("failed to list library");
    let series_a = library
        .iter()
        .find(|s| s.title == "Series A")
        .expect("series missing");
    assert_eq!(
        series_a.cover_path.as_deref(),
        Some(root.join("Series A").join("cover.jpg").to_string_lossy().as_ref())
    );

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn search_matches_title_case_insensitively() {
    let store = temp_store().await;
    let root = temp_library();
    let (scanner, _rx) = scanner(&store);

    scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");

    let found = store.search_series("other").await.expect("search failed");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Other Show");
    assert!(store.search_series("   ").await.expect("search failed").is_empty());

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn search_treats_wildcards_literally() {
    let store = temp_store().await;
    for title in ["Plain Show", "Under_Score", "100% Done"] {
        store
            .get_or_create_series(title, &format!("/lib/{title}"))
            .await
            .expect("failed to create series");
    }

    let underscore = store.search_series("_").await.expect("search failed");
    assert_eq!(underscore.len(), 1);
    assert_eq!(underscore[0].title, "Under_Score");

    let percent = store.search_series("%").await.expect("search failed");
    assert_eq!(percent.len(), 1);
    assert_eq!(percent[0].title, "100% Done");

    assert_eq!(store.search_series("show").await.expect("search failed").len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_file_is_reported_and_scan_continues() {
    let store = temp_store().await;
    let root = temp_library();
    let dangling = root.join("Series A").join("Series A - 03.mkv");
    std::os::unix::fs::symlink(root.join("gone.mkv"), &dangling).expect("failed to create symlink");

    let config = LibraryConfig {
        follow_links: true,
        ..LibraryConfig::default()
    };
    let (tx, _rx) = broadcast::channel(256);
    let scanner = LibraryScanner::new(store.clone(), config, tx);

    let report = scanner
        .scan(&root, &CancellationToken::new())
        .await
        .expect("scan failed");

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, dangling);
    assert_eq!(report.episodes_added, 3);

    let library = store.all_series_with_episodes().await.expect("failed to list library");
    let series_a = library
        .iter()
        .find(|s| s.title == "Series A")
        .expect("series missing");
    assert_eq!(series_a.episodes.len(), 2);

    let _ = std::fs::remove_dir_all(root);
}
