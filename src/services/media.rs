use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Reads container metadata through the `ffprobe` binary.
pub struct MediaService;

impl Default for MediaService {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaService {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Playback length in seconds. Blocks while ffprobe runs.
    pub fn probe_duration(&self, path: &Path) -> Result<f32> {
        let output = ffprobe::ffprobe(path)
            .with_context(|| format!("Failed to run ffprobe on {}", path.display()))?;

        let duration_secs = output
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f32>().ok())
            .or_else(|| {
                output
                    .streams
                    .iter()
                    .find(|s| s.codec_type.as_deref() == Some("video"))
                    .and_then(|s| s.duration.as_deref())
                    .and_then(|d| d.parse::<f32>().ok())
            })
            .context("No duration reported")?;

        debug!(path = %path.display(), duration_secs, "Probed media duration");

        Ok(duration_secs)
    }
}
