use crate::config::LibraryConfig;
use crate::constants::{self, metrics as metric_names};
use crate::db::{Store, StoreError};
use crate::domain::events::CatalogEvent;
use crate::domain::{SeriesId, UpsertOutcome};
use crate::models::EpisodeInput;
use crate::parser::{self, natural_cmp};
use crate::services::media::MediaService;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fatal scan failures. Problems with single files end up in
/// [`ScanReport::errors`] instead.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Library root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("Library root is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// A file or folder that could not be indexed.
#[derive(Debug, Clone, Serialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Titles of series created or changed by this scan, in discovery order.
    pub series_touched: Vec<String>,
    pub episodes_added: usize,
    pub episodes_updated: usize,
    /// New paths whose content matches an episode whose old file is gone.
    pub moved: usize,
    pub errors: Vec<ScanIssue>,
    pub cancelled: bool,
}

impl ScanReport {
    fn touch(&mut self, title: &str) {
        if !self.series_touched.iter().any(|t| t == title) {
            self.series_touched.push(title.to_string());
        }
    }
}

/// One series folder as found on disk.
#[derive(Debug)]
struct SeriesPlan {
    folder: PathBuf,
    title: String,
    local_cover: Option<PathBuf>,
    groups: Vec<EpisodeGroup>,
}

impl SeriesPlan {
    fn has_sub_series(&self) -> bool {
        self.groups.iter().any(|g| g.sub_series.is_some())
    }
}

/// Files sharing a sub-series folder (or sitting directly in the series
/// folder when `sub_series` is `None`), in natural order.
#[derive(Debug)]
struct EpisodeGroup {
    sub_series: Option<String>,
    files: Vec<PathBuf>,
}

enum Discovery {
    Total(usize),
    Series(SeriesPlan),
    Issue(ScanIssue),
}

pub struct LibraryScanner {
    store: Store,
    config: LibraryConfig,
    event_bus: broadcast::Sender<CatalogEvent>,
}

impl LibraryScanner {
    #[must_use]
    pub const fn new(
        store: Store,
        config: LibraryConfig,
        event_bus: broadcast::Sender<CatalogEvent>,
    ) -> Self {
        Self {
            store,
            config,
            event_bus,
        }
    }

    /// Indexes every series folder under `root`.
    ///
    /// Safe to re-run: an unchanged tree produces no new rows. Files that
    /// disappeared are left in place; see [`Store::prune_missing`].
    pub async fn scan(&self, root: &Path, cancel: &CancellationToken) -> Result<ScanReport, ScanError> {
        let result = self.run(root, cancel).await;

        match &result {
            Ok(report) => {
                let _ = self.event_bus.send(CatalogEvent::ScanFinished {
                    series_touched: report.series_touched.len(),
                    episodes_added: report.episodes_added,
                    episodes_updated: report.episodes_updated,
                    errors: report.errors.len(),
                    cancelled: report.cancelled,
                });
            }
            Err(e) => {
                error!(event = "library_scan_failed", error = %e, "Library scan failed");
                let _ = self.event_bus.send(CatalogEvent::ScanFailed {
                    message: e.to_string(),
                });
            }
        }

        result
    }

    async fn run(&self, root: &Path, cancel: &CancellationToken) -> Result<ScanReport, ScanError> {
        let start = std::time::Instant::now();

        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|_| ScanError::RootMissing(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }
        self.store.ping().await?;

        let _ = self.event_bus.send(CatalogEvent::ScanStarted {
            root: root.display().to_string(),
        });
        info!(event = "library_scan_started", path = %root.display(), "Scanning library");

        let (tx, mut rx) = mpsc::channel(16);
        let walk_root = root.clone();
        let walk_config = self.config.clone();
        let walk_cancel = cancel.clone();

        // Offload blocking I/O to a dedicated thread
        let walker = tokio::task::spawn_blocking(move || {
            discover(&walk_root, &walk_config, &walk_cancel, &tx);
        });

        let mut report = ScanReport::default();
        let mut total = 0;
        let mut current = 0;

        while let Some(message) = rx.recv().await {
            match message {
                Discovery::Total(count) => total = count,
                Discovery::Issue(issue) => {
                    metrics::counter!(metric_names::SCAN_ERRORS_TOTAL).increment(1);
                    report.errors.push(issue);
                }
                Discovery::Series(plan) => {
                    current += 1;
                    self.index_series(&root, &plan, cancel, &mut report).await;
                    let _ = self
                        .event_bus
                        .send(CatalogEvent::ScanProgress { current, total });
                }
            }

            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
        }

        // Dropping the receiver stops the walker at its next send.
        drop(rx);
        walker.await?;

        info!(
            event = "library_scan_finished",
            series_touched = report.series_touched.len(),
            added = report.episodes_added,
            updated = report.episodes_updated,
            moved = report.moved,
            errors = report.errors.len(),
            cancelled = report.cancelled,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Library scan completed"
        );

        Ok(report)
    }

    async fn index_series(
        &self,
        root: &Path,
        plan: &SeriesPlan,
        cancel: &CancellationToken,
        report: &mut ScanReport,
    ) {
        let folder = plan.folder.to_string_lossy();
        let (series_id, created) = match self.store.get_or_create_series(&plan.title, &folder).await {
            Ok(found) => found,
            Err(e) => {
                error!(title = %plan.title, error = %e, "Failed to create series");
                report.errors.push(ScanIssue {
                    path: plan.folder.clone(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let _ = self.event_bus.send(CatalogEvent::SeriesDiscovered {
            title: plan.title.clone(),
        });
        if created {
            report.touch(&plan.title);
        }

        if let Some(cover) = &plan.local_cover {
            match self
                .store
                .set_series_cover_if_missing(series_id, &cover.to_string_lossy())
                .await
            {
                Ok(true) => report.touch(&plan.title),
                Ok(false) => {}
                Err(e) => warn!(title = %plan.title, error = %e, "Failed to record local cover"),
            }
        }

        let direct_season = plan.has_sub_series().then_some(0);
        let mut slots = HashSet::new();

        for group in &plan.groups {
            for (index, file) in group.files.iter().enumerate() {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    return;
                }

                let input = match self.describe(root, file, group, index, direct_season).await {
                    Ok(input) => input,
                    Err(e) => {
                        warn!(path = %file.display(), error = %e, "Failed to read episode file");
                        metrics::counter!(metric_names::SCAN_ERRORS_TOTAL).increment(1);
                        report.errors.push(ScanIssue {
                            path: file.clone(),
                            message: e.to_string(),
                        });
                        continue;
                    }
                };
                metrics::counter!(metric_names::SCAN_FILES_TOTAL).increment(1);

                let slot = (input.season, input.sub_series_title.clone(), input.episode_number);
                if input.episode_number.is_some() && !slots.insert(slot) {
                    debug!(
                        path = %file.display(),
                        season = input.season,
                        episode = input.episode_number,
                        "Duplicate episode number within series"
                    );
                }

                self.store_episode(series_id, &plan.title, file, &input, report)
                    .await;
            }
        }
    }

    /// Parses and hashes one file.
    async fn describe(
        &self,
        root: &Path,
        file: &Path,
        group: &EpisodeGroup,
        index: usize,
        direct_season: Option<i32>,
    ) -> std::io::Result<EpisodeInput> {
        let content_hash = content_hash(file, self.config.hash_window_bytes).await?;

        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let hints = path_hints(root, file);
        let hint_refs: Vec<&str> = hints.iter().map(String::as_str).collect();
        let parsed = parser::parse(&filename, &hint_refs);

        let season = match (&group.sub_series, direct_season) {
            (None, Some(season)) => season,
            _ => parsed.season,
        };
        let fallback = i32::try_from(index + 1).unwrap_or(i32::MAX);

        Ok(EpisodeInput {
            file_path: file.to_string_lossy().into_owned(),
            content_hash: Some(content_hash),
            season,
            episode_number: parsed.episode.or(Some(fallback)),
            sub_series_title: group.sub_series.clone(),
            title: parsed.episode_title,
        })
    }

    async fn store_episode(
        &self,
        series_id: SeriesId,
        title: &str,
        file: &Path,
        input: &EpisodeInput,
        report: &mut ScanReport,
    ) {
        match self.store.upsert_episode(series_id, input).await {
            Ok(UpsertOutcome::Inserted(episode_id)) => {
                report.episodes_added += 1;
                report.touch(title);

                if let Some(hash) = &input.content_hash
                    && self.detect_move(hash, &input.file_path).await
                {
                    report.moved += 1;
                }

                if self.config.probe_duration {
                    let path = file.to_path_buf();
                    let probed = tokio::task::spawn_blocking(move || {
                        MediaService::new().probe_duration(&path)
                    })
                    .await;
                    if let Ok(Ok(duration)) = probed
                        && let Err(e) = self.store.set_episode_duration(episode_id, duration).await
                    {
                        warn!(path = %file.display(), error = %e, "Failed to store duration");
                    }
                }
            }
            Ok(UpsertOutcome::Updated(_)) => {
                report.episodes_updated += 1;
                report.touch(title);
            }
            Ok(UpsertOutcome::Unchanged(_)) => {}
            Err(e) => {
                error!(path = %file.display(), error = %e, "Failed to store episode");
                report.errors.push(ScanIssue {
                    path: file.to_path_buf(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Whether a freshly inserted file looks like an existing episode that
    /// moved: same content, old path gone. The old row stays until pruned.
    async fn detect_move(&self, hash: &str, new_path: &str) -> bool {
        let candidates = match self.store.find_episodes_by_hash(hash, new_path).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(path = new_path, error = %e, "Failed to look up content hash");
                return false;
            }
        };

        for old in candidates {
            if !tokio::fs::try_exists(&old.file_path).await.unwrap_or(true) {
                info!(
                    event = "library_file_moved",
                    from = %old.file_path,
                    to = new_path,
                    "Episode file moved"
                );
                return true;
            }
        }
        false
    }
}

/// SHA-256 over the first `window` bytes of `path`, hex encoded.
pub async fn content_hash(path: &Path, window: u64) -> std::io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    let mut reader = file.take(window);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Folder names between `root` and the file's directory, innermost last.
fn path_hints(root: &Path, file: &Path) -> Vec<String> {
    file.parent()
        .and_then(|dir| dir.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Walks the library on a blocking thread, sending one plan per series folder.
fn discover(
    root: &Path,
    config: &LibraryConfig,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<Discovery>,
) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) => {
            let _ = tx.blocking_send(Discovery::Issue(ScanIssue {
                path: root.to_path_buf(),
                message: e.to_string(),
            }));
            return;
        }
    };

    let mut folders: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && !config.is_ignored(&file_name(path)))
        .filter(|path| config.follow_links || !path.is_symlink())
        .collect();
    folders.sort_by(|a, b| natural_cmp(&file_name(a), &file_name(b)));

    if tx.blocking_send(Discovery::Total(folders.len())).is_err() {
        return;
    }

    for folder in folders {
        if cancel.is_cancelled() {
            return;
        }

        let (plan, issues) = plan_series(&folder, config);
        for issue in issues {
            if tx.blocking_send(Discovery::Issue(issue)).is_err() {
                return;
            }
        }
        if !plan.groups.is_empty() && tx.blocking_send(Discovery::Series(plan)).is_err() {
            return;
        }
    }
}

fn plan_series(folder: &Path, config: &LibraryConfig) -> (SeriesPlan, Vec<ScanIssue>) {
    let mut issues = Vec::new();
    let mut direct = Vec::new();
    let mut sub_series: Vec<EpisodeGroup> = Vec::new();

    let walker = walkdir::WalkDir::new(folder)
        .follow_links(config.follow_links)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.file_type().is_dir()
                && config.is_ignored(&entry.file_name().to_string_lossy()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                issues.push(ScanIssue {
                    path: e.path().unwrap_or(folder).to_path_buf(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || !config.is_video(path) {
            continue;
        }

        let Ok(relative) = path.strip_prefix(folder) else {
            continue;
        };
        let mut components = relative.components();
        let first = components.next();
        if components.next().is_none() {
            direct.push(path.to_path_buf());
            continue;
        }

        let label = first
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .unwrap_or_default();
        match sub_series
            .iter_mut()
            .find(|g| g.sub_series.as_deref() == Some(label.as_str()))
        {
            Some(group) => group.files.push(path.to_path_buf()),
            None => sub_series.push(EpisodeGroup {
                sub_series: Some(label),
                files: vec![path.to_path_buf()],
            }),
        }
    }

    let mut groups = Vec::with_capacity(sub_series.len() + 1);
    if !direct.is_empty() {
        groups.push(EpisodeGroup {
            sub_series: None,
            files: direct,
        });
    }
    sub_series.sort_by(|a, b| {
        natural_cmp(
            a.sub_series.as_deref().unwrap_or_default(),
            b.sub_series.as_deref().unwrap_or_default(),
        )
    });
    groups.extend(sub_series);

    for group in &mut groups {
        group.files.sort_by(|a, b| {
            natural_cmp(
                &a.strip_prefix(folder).unwrap_or(a).to_string_lossy(),
                &b.strip_prefix(folder).unwrap_or(b).to_string_lossy(),
            )
        });
    }

    let local_cover = constants::LOCAL_COVER_NAMES
        .iter()
        .map(|name| folder.join(name))
        .find(|path| path.is_file());

    let plan = SeriesPlan {
        folder: folder.to_path_buf(),
        title: parser::clean_title(&file_name(folder)),
        local_cover,
        groups,
    };

    (plan, issues)
}
