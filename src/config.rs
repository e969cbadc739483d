use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub library: LibraryConfig,

    pub metadata: MetadataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Emit logs as JSON lines instead of the human-readable format.
    pub log_json: bool,

    /// Event bus buffer size (default: 100)
    pub event_bus_buffer_size: usize,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/anicat.db".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            event_bus_buffer_size: 100,
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub library_path: String,

    /// Extensions (without the dot, matched case-insensitively) treated as episodes.
    pub video_extensions: Vec<String>,

    /// Leading bytes of each file fed into the content hash.
    pub hash_window_bytes: u64,

    pub follow_links: bool,

    /// Folder names skipped while scanning, compared case-insensitively.
    pub ignored_folders: Vec<String>,

    /// Probe newly added episodes with ffprobe to record their duration.
    pub probe_duration: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_path: "./library".to_string(),
            video_extensions: constants::VIDEO_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            hash_window_bytes: constants::DEFAULT_HASH_WINDOW_BYTES,
            follow_links: false,
            ignored_folders: vec!["extras".to_string()],
            probe_duration: false,
        }
    }
}

impl LibraryConfig {
    #[must_use]
    pub fn is_video(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.video_extensions
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }

    #[must_use]
    pub fn is_ignored(&self, folder_name: &str) -> bool {
        folder_name.starts_with('.')
            || self
                .ignored_folders
                .iter()
                .any(|ignored| ignored.eq_ignore_ascii_case(folder_name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub enabled: bool,

    pub api_url: String,

    /// Request timeout in seconds (default: 10)
    pub request_timeout_seconds: u64,

    /// Minimum delay between two requests to the metadata provider.
    pub min_request_interval_ms: u64,

    pub covers_path: String,

    pub user_agent: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: constants::ANILIST_API_URL.to_string(),
            request_timeout_seconds: 10,
            min_request_interval_ms: 1000,
            covers_path: "data/covers".to_string(),
            user_agent: format!("anicat/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("anicat").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".anicat").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.library.library_path.trim().is_empty() {
            anyhow::bail!("library.library_path cannot be empty");
        }

        if self.library.hash_window_bytes == 0 {
            anyhow::bail!("library.hash_window_bytes must be > 0");
        }

        if self.library.video_extensions.is_empty() {
            anyhow::bail!("library.video_extensions cannot be empty");
        }

        if self.metadata.enabled && self.metadata.request_timeout_seconds == 0 {
            anyhow::bail!("metadata.request_timeout_seconds must be > 0");
        }

        if self.metadata.enabled && self.metadata.api_url.is_empty() {
            anyhow::bail!("metadata.api_url cannot be empty when enabled");
        }

        Ok(())
    }
}
