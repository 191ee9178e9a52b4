//! Bounded retry for per-thread downloads.

use std::future::Future;
use std::time::Duration;

use castsense_core::Result;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after a generic failure.
    pub retry_delay: Duration,
    /// Delay after a rate-limit response.
    pub rate_limit_delay: Duration,
    /// Pause after each successful download.
    pub pacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
            rate_limit_delay: Duration::from_secs(60),
            pacing: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no waiting.
    pub fn immediate() -> Self {
        Self {
            retry_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
            pacing: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Run `op` until it succeeds or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. Returns `None` when every
    /// attempt failed; the caller skips the item.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            match op(attempt).await {
                Ok(value) => {
                    pause(self.pacing).await;
                    return Some(value);
                }
                Err(e) => {
                    warn!("Error on attempt {} for {}: {}", attempt, label, e);
                    if attempt == attempts {
                        break;
                    }
                    if e.is_rate_limited() {
                        warn!("Rate limited. Sleeping {:?} before retrying", self.rate_limit_delay);
                        pause(self.rate_limit_delay).await;
                    } else {
                        pause(self.retry_delay).await;
                    }
                }
            }
        }
        error!("Failed all {} attempts for {}. Skipping.", attempts, label);
        None
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castsense_core::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate()
            .run("thread", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Error::RateLimited("429".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_none() {
        let calls = AtomicU32::new(0);
        let result: Option<()> = RetryPolicy::immediate()
            .run("thread", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::Fetch("boom".into())) }
            })
            .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_uses_long_delay() {
        let policy = RetryPolicy {
            max_attempts: 2,
            pacing: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let start = tokio::time::Instant::now();
        let result = policy
            .run("thread", |attempt| async move {
                if attempt == 1 {
                    Err(Error::RateLimited("429".into()))
                } else {
                    Ok(())
                }
            })
            .await;
        assert!(result.is_some());
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
