//! Per-client token bucket rate limiting.
//!
//! Each client id owns an independent bucket. Buckets start full, drain
//! one token per admitted request, and refill continuously at the
//! configured rate up to capacity.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

/// Token bucket configuration shared by all clients.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum tokens a bucket can hold
    pub capacity: f64,

    /// Tokens added per second
    pub refill_per_sec: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 60.0,
            refill_per_sec: 1.0,
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// In-memory token bucket rate limiter keyed by client id.
pub struct RateLimiter {
    buckets: RwLock<HashMap<String, Bucket>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Try to admit one request for `client_id`. Returns false when the
    /// client's bucket is empty.
    pub async fn admit(&self, client_id: &str) -> bool {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;

        let bucket = buckets.entry(client_id.to_string()).or_insert_with(|| Bucket {
            tokens: self.config.capacity,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * self.config.refill_per_sec).min(self.config.capacity);
        bucket.last_refill = now;
        bucket.last_seen = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            log::debug!("Rate limit exceeded for client '{}'", client_id);
            false
        }
    }

    /// Seconds until the client has a full token again. Zero when the
    /// client is unknown or already has budget.
    pub async fn retry_after_secs(&self, client_id: &str) -> u64 {
        let buckets = self.buckets.read().await;
        match buckets.get(client_id) {
            Some(bucket) if bucket.tokens < 1.0 => {
                let deficit = 1.0 - bucket.tokens;
                (deficit / self.config.refill_per_sec).ceil() as u64
            }
            _ => 0,
        }
    }

    /// Drop buckets that have not been touched for `max_idle`. Intended
    /// to run on a periodic background task.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) < max_idle);
        let evicted = before - buckets.len();
        if evicted > 0 {
            log::debug!("Evicted {} idle rate limit buckets", evicted);
        }
        evicted
    }

    pub async fn tracked_clients(&self) -> usize {
        self.buckets.read().await.len()
    }
}
