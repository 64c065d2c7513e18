use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{BUCKET_DEFAULT_MAX_WAIT_SECS, BUCKET_POLL_MS};
use crate::error::{AppError, Result};

/// Local mirror of the upstream token bucket (§4.1). Tokens are refilled
/// lazily on each access rather than by a background ticker, and the count
/// is periodically corrected from the authoritative value returned by the
/// upstream API via [`TokenBucket::sync`].
struct BucketState {
    tokens: f64,
    capacity: f64,
    per_minute: f64,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        if elapsed <= 0.0 {
            return;
        }
        let gained = elapsed * (self.per_minute / 60.0);
        self.tokens = (self.tokens + gained).min(self.capacity);
        self.last_refill = now;
    }
}

pub struct TokenBucket {
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(capacity: u32, per_minute: u32) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                capacity: capacity as f64,
                per_minute: per_minute as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Blocks the caller, polling every `BUCKET_POLL_MS`, until `cost` tokens
    /// are available, then debits them. Returns the number of milliseconds
    /// spent waiting. Uses the default `maxWait` of
    /// [`BUCKET_DEFAULT_MAX_WAIT_SECS`] (§4.1).
    pub async fn acquire(&self, cost: u32) -> Result<u64> {
        self.acquire_with_timeout(cost, Duration::from_secs(BUCKET_DEFAULT_MAX_WAIT_SECS))
            .await
    }

    /// As [`TokenBucket::acquire`], but with an explicit `maxWait` (§4.1
    /// `Acquire(cost, maxWait)`).
    pub async fn acquire_with_timeout(&self, cost: u32, max_wait: Duration) -> Result<u64> {
        let cost = cost as f64;
        let start = Instant::now();

        loop {
            {
                let mut guard = self.state.lock().await;
                guard.refill();
                if guard.tokens >= cost {
                    guard.tokens -= cost;
                    let waited_ms = start.elapsed().as_millis() as u64;
                    if waited_ms > 0 {
                        debug!(waited_ms, "token bucket satisfied request after waiting");
                    }
                    return Ok(waited_ms);
                }
            }

            let waited_ms = start.elapsed().as_millis() as u64;
            if Duration::from_millis(waited_ms) > max_wait {
                warn!(waited_ms, "token bucket exhausted, giving up");
                return Err(AppError::TokensExhausted { waited_ms });
            }
            sleep(Duration::from_millis(BUCKET_POLL_MS)).await;
        }
    }

    /// Overwrites the local token count with the authoritative value reported
    /// by the upstream API's `tokensLeft` field, and (if provided) its
    /// refill rate. Called after every upstream response (§4.1, §4.2).
    pub async fn sync(&self, tokens_left: i64, refill_rate_per_minute: Option<i64>) {
        let mut guard = self.state.lock().await;
        guard.tokens = (tokens_left as f64).clamp(0.0, guard.capacity);
        if let Some(rate) = refill_rate_per_minute {
            if rate > 0 {
                guard.per_minute = rate as f64;
            }
        }
        guard.last_refill = Instant::now();
    }

    /// Current token count and capacity, for diagnostics.
    pub async fn snapshot(&self) -> (f64, f64) {
        let mut guard = self.state.lock().await;
        guard.refill();
        (guard.tokens, guard.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_immediately_when_tokens_available() {
        let bucket = TokenBucket::new(10, 60);
        let waited = bucket.acquire(3).await.unwrap();
        assert_eq!(waited, 0);
        let (tokens, _) = bucket.snapshot().await;
        assert!((tokens - 7.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn sync_overwrites_local_count() {
        let bucket = TokenBucket::new(200, 20);
        bucket.sync(15, Some(20)).await;
        let (tokens, capacity) = bucket.snapshot().await;
        assert!((tokens - 15.0).abs() < 0.5);
        assert_eq!(capacity, 200.0);
    }

    #[tokio::test]
    async fn sync_clamps_to_capacity() {
        let bucket = TokenBucket::new(50, 20);
        bucket.sync(9999, None).await;
        let (tokens, capacity) = bucket.snapshot().await;
        assert_eq!(tokens, capacity);
    }

    #[tokio::test]
    async fn refill_accrues_over_time() {
        let bucket = TokenBucket::new(100, 6_000);
        bucket.acquire(100).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (tokens, _) = bucket.snapshot().await;
        assert!(tokens > 0.0);
    }
}
