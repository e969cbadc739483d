pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "m4v", "flv", "wmv"];

pub const DEFAULT_HASH_WINDOW_BYTES: u64 = 1024 * 1024;

pub const ANILIST_API_URL: &str = "https://graphql.anilist.co";

/// Description stored when the provider has nothing for a series.
pub const NO_DESCRIPTION_PLACEHOLDER: &str = "No description available.";

/// File names picked up as a series cover when present in its folder.
pub const LOCAL_COVER_NAMES: &[&str] = &["cover.jpg", "poster.jpg", "folder.jpg", "cover.png"];

pub mod metrics {

    pub const SCAN_FILES_TOTAL: &str = "anicat_scan_files_total";

    pub const SCAN_ERRORS_TOTAL: &str = "anicat_scan_errors_total";

    pub const ENRICH_REQUESTS_TOTAL: &str = "anicat_enrich_requests_total";

    pub const ENRICH_FAILURES_TOTAL: &str = "anicat_enrich_failures_total";
}
