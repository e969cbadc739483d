use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

const DEFAULT_EXTENSION: &str = "jpg";

/// On-disk cover cache keyed by the source URL.
///
/// Entries are never rewritten once present. Writers racing on the same key
/// produce the same bytes, and the final rename is atomic.
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir: PathBuf,
}

impl CoverCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the image for `url` is (or will be) stored.
    #[must_use]
    pub fn path_for(&self, url: &str) -> PathBuf {
        let key = hex::encode(Sha256::digest(url.as_bytes()));
        self.dir.join(format!("{key}.{}", extension_of(url)))
    }

    /// Cached path for `url`, if already downloaded.
    pub async fn lookup(&self, url: &str) -> Option<PathBuf> {
        let path = self.path_for(url);
        fs::try_exists(&path).await.unwrap_or(false).then_some(path)
    }

    /// Stores `bytes` for `url` unless an entry already exists.
    pub async fn store(&self, url: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.path_for(url);
        if fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "Cover already cached");
            return Ok(path);
        }

        fs::create_dir_all(&self.dir).await?;

        let tmp = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        info!(url, path = %path.display(), "Cached cover image");
        Ok(path)
    }
}

fn extension_of(url: &str) -> String {
    let from_path = url::Url::parse(url).ok().and_then(|parsed| {
        Path::new(parsed.path())
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    });

    from_path
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache() -> CoverCache {
        CoverCache::new(std::env::temp_dir().join(format!("anicat-covers-{}", uuid::Uuid::new_v4())))
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("https://img.example/cover/bx21-abc.PNG"), "png");
        assert_eq!(extension_of("https://img.example/cover/large.webp?x=1"), "webp");
        assert_eq!(extension_of("https://img.example/cover/noext"), "jpg");
        assert_eq!(extension_of("not a url"), "jpg");
    }

    #[test]
    fn test_same_url_same_path() {
        let cache = temp_cache();
        let a = cache.path_for("https://img.example/a.jpg");
        assert_eq!(a, cache.path_for("https://img.example/a.jpg"));
        assert_ne!(a, cache.path_for("https://img.example/b.jpg"));
        assert!(a.starts_with(cache.dir()));
    }

    #[tokio::test]
    async fn test_store_keeps_first_write() {
        let cache = temp_cache();
        let url = "https://img.example/cover.png";
        assert!(cache.lookup(url).await.is_none());

        let first = cache.store(url, b"first").await.unwrap();
        let second = cache.store(url, b"second").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(cache.lookup(url).await, Some(first));

        let _ = std::fs::remove_dir_all(cache.dir());
    }
}
