use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

/// Paces requests to the store: a minimum gap between calls plus a soft
/// per-minute ceiling.
pub struct RateLimiter {
    state: Arc<Mutex<RateLimitState>>,
    min_interval: Duration,
    max_per_minute: u32,
}

struct RateLimitState {
    last_request: Option<Instant>,
    blocked_until: Option<Instant>,
    requests_this_minute: u32,
    minute_start: Instant,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, max_per_minute: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(RateLimitState {
                last_request: None,
                blocked_until: None,
                requests_this_minute: 0,
                minute_start: Instant::now(),
            })),
            min_interval,
            max_per_minute,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO, u32::MAX)
    }

    pub async fn wait(&self) {
        let mut state = self.state.lock().await;

        // Honour an explicit back-off from a 429
        if let Some(until) = state.blocked_until.take() {
            let now = Instant::now();
            if until > now {
                let wait_duration = until - now;
                drop(state);
                tracing::info!("Rate limited by store, waiting {:?}", wait_duration);
                sleep(wait_duration).await;
                state = self.state.lock().await;
            }
        }

        if let Some(last) = state.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait_duration = self.min_interval - elapsed;
                drop(state);
                sleep(wait_duration).await;
                state = self.state.lock().await;
            }
        }

        let minute_elapsed = state.minute_start.elapsed();
        if minute_elapsed < Duration::from_secs(60) {
            if state.requests_this_minute >= self.max_per_minute {
                let wait_time = Duration::from_secs(60) - minute_elapsed;
                drop(state);
                tracing::debug!("Soft rate limiting, waiting {:?}", wait_time);
                sleep(wait_time).await;
                state = self.state.lock().await;
                state.requests_this_minute = 0;
                state.minute_start = Instant::now();
            }
        } else {
            state.requests_this_minute = 0;
            state.minute_start = Instant::now();
        }

        state.requests_this_minute += 1;
        state.last_request = Some(Instant::now());
    }

    /// Hold the next `wait` until `duration` from now has passed.
    pub async fn back_off(&self, duration: Duration) {
        let mut state = self.state.lock().await;
        state.blocked_until = Some(Instant::now() + duration);
    }

    #[cfg(test)]
    pub(crate) async fn is_backing_off(&self) -> bool {
        let state = self.state.lock().await;
        state.blocked_until.map_or(false, |until| until > Instant::now())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 30)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_requests() {
        let limiter = RateLimiter::unlimited();
        limiter.wait().await;
        limiter.wait().await;
        assert_eq!(limiter.state.lock().await.requests_this_minute, 2);
    }

    #[tokio::test]
    async fn test_enforces_min_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(50), 30);
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_back_off_delays_next_wait() {
        let limiter = RateLimiter::unlimited();
        limiter.back_off(Duration::from_millis(50)).await;
        assert!(limiter.is_backing_off().await);

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!limiter.is_backing_off().await);
    }

    #[tokio::test]
    async fn test_lock_released_while_backing_off() {
        let limiter = RateLimiter::unlimited();
        limiter.back_off(Duration::from_millis(200)).await;

        let waiting = limiter.wait();
        tokio::pin!(waiting);
        // Let the waiter take the back-off and start sleeping
        let _ = tokio::time::timeout(Duration::from_millis(20), &mut waiting).await;

        let locked = tokio::time::timeout(Duration::from_millis(20), limiter.state.lock()).await;
        assert!(locked.is_ok());
    }
}
