//! Minimum-spacing limiter for calls to the metadata provider.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Grants permits no closer together than `min_interval`.
///
/// The lock is held while sleeping, so concurrent callers queue up and each
/// one is spaced from the previous grant.
pub struct RateLimiter {
    min_interval: Duration,
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the next call may start.
    ///
    /// Returns `false` without granting a permit if `cancel` fires first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let mut last = self.last_grant.lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                () = tokio::time::sleep_until(ready_at) => {}
            }
        } else if cancel.is_cancelled() {
            return false;
        }

        *last = Some(Instant::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_permit_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.wait(&CancellationToken::new()).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_spaces_consecutive_permits() {
        let limiter = RateLimiter::new(Duration::from_millis(120));
        let cancel = CancellationToken::new();

        assert!(limiter.wait(&cancel).await);
        let first = Instant::now();
        assert!(limiter.wait(&cancel).await);

        assert!(first.elapsed() >= Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_cancelled_token_never_gets_permit_after_deadline() {
        let limiter = RateLimiter::new(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        assert!(limiter.wait(&cancel).await);

        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        for _ in 0..32 {
            assert!(!limiter.wait(&cancel).await);
        }
    }

    #[tokio::test]
    async fn test_cancel_interrupts_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        assert!(limiter.wait(&cancel).await);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert!(!limiter.wait(&cancel).await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
