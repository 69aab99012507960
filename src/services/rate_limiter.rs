use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::time::{Duration, Instant};

/// Throttle for outbound market-data calls.
///
/// Caps how many requests are in flight at once and spaces consecutive
/// requests at least `60s / requests_per_minute` apart. Price and reference
/// fetchers share one instance since they hit the same upstream.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    /// Time the most recent permit was handed out
    last_request: Mutex<Option<Instant>>,
    min_delay: Duration,
}

impl RateLimiter {
    /// # Arguments
    /// * `max_concurrent` - Maximum number of requests in flight (at least 1)
    /// * `requests_per_minute` - Maximum request rate (at least 1)
    pub fn new(max_concurrent: usize, requests_per_minute: u32) -> Self {
        let min_delay_ms = 60_000 / u64::from(requests_per_minute.max(1));
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            last_request: Mutex::new(None),
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    /// Wait for a concurrency slot and for the minimum spacing to elapse.
    ///
    /// The returned guard releases the slot when dropped.
    pub async fn acquire(&self) -> Result<RateLimitGuard, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;

        // Reserve the next slot under the lock, then sleep outside it
        let wait_until = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) if prev + self.min_delay > now => prev + self.min_delay,
                _ => now,
            };
            *last = Some(slot);
            slot
        };

        tokio::time::sleep_until(wait_until).await;

        Ok(RateLimitGuard { _permit: permit })
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Holds a rate limit slot until dropped.
pub struct RateLimitGuard {
    _permit: OwnedSemaphorePermit,
}
