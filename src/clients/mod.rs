pub mod anilist;

use async_trait::async_trait;
use thiserror::Error;

pub use anilist::AnilistClient;

/// Failures talking to the metadata provider or image host. None of these
/// abort an enrichment run.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Best match for a title search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderMatch {
    pub external_id: i32,
    pub title: String,
    /// Plain text, markup already stripped.
    pub synopsis: Option<String>,
    pub genres: Vec<String>,
    /// Cover image URLs, largest first.
    pub cover_urls: Vec<String>,
    /// Score on a 0-10 scale.
    pub rating: Option<f32>,
}

impl ProviderMatch {
    #[must_use]
    pub fn best_cover(&self) -> Option<&str> {
        self.cover_urls.first().map(String::as_str)
    }
}

/// A searchable source of series metadata plus the host serving its images.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// `Ok(None)` means the provider answered but knows no such title.
    async fn search(&self, title: &str) -> Result<Option<ProviderMatch>, ProviderError>;

    /// Raw image bytes, saved as-is.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}
