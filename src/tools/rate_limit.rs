use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Outbound throttle shared by every run that uses the same gateway.
///
/// Caps the number of in-flight capability calls and spaces call starts at
/// least `min_interval` apart.
#[derive(Debug)]
pub struct RateLimiter {
    permits: Semaphore,
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_concurrent.max(1)),
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Semaphore::MAX_PERMITS, Duration::ZERO)
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free slot. The call may start once this returns and must
    /// hold the permit until it finishes.
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        // The semaphore is never closed, so this only yields None in theory.
        let permit = self.permits.acquire().await.ok();

        if !self.min_interval.is_zero() {
            let wait = {
                let mut next = self.next_slot.lock();
                let now = Instant::now();
                let slot = match *next {
                    Some(at) if at > now => at,
                    _ => now,
                };
                *next = Some(slot + self.min_interval);
                slot.saturating_duration_since(now)
            };
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }

        permit
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_returned() {
        let limiter = RateLimiter::new(2, Duration::ZERO);
        {
            let _a = limiter.acquire().await;
            let _b = limiter.acquire().await;
            assert_eq!(limiter.available_permits(), 0);
        }
        assert_eq!(limiter.available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_spaces_call_starts() {
        let limiter = RateLimiter::new(4, Duration::from_millis(500));
        let start = Instant::now();
        for _ in 0..3 {
            let _permit = limiter.acquire().await;
        }
        // first call is immediate, the next two wait one interval each
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert!(start.elapsed() < Duration::from_millis(1500));
    }
}
