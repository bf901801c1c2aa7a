//! Token buckets for global and per-host rate limiting.
//!
//! Buckets refill continuously at the configured rate. Waiters compute the
//! exact shortfall and sleep it off rather than spinning; the sleep is cut
//! short by the job's deadline or cancel token.

use crate::base::cancel::JobCtx;
use crate::base::error::NetError;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// `rate_per_sec` tokens per second, holding at most `capacity`.
    pub fn new(rate_per_sec: f64, capacity: f64) -> Self {
        Self {
            capacity,
            rate_per_sec,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    fn refill(state: &mut BucketState, rate: f64, capacity: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * rate).min(capacity);
        state.last_refill = now;
    }

    /// Take one token if available, without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("token bucket lock poisoned");
        Self::refill(&mut state, self.rate_per_sec, self.capacity);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait for one token, bounded by the job's deadline and cancel token.
    pub async fn acquire(&self, ctx: &JobCtx) -> Result<(), NetError> {
        loop {
            let wait = {
                let mut state = self.state.lock().expect("token bucket lock poisoned");
                Self::refill(&mut state, self.rate_per_sec, self.capacity);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                let shortfall = 1.0 - state.tokens;
                Duration::from_secs_f64(shortfall / self.rate_per_sec)
            };
            ctx.sleep(wait).await?;
        }
    }
}

/// One bucket per host, created lazily at a shared rate.
pub struct HostLimiter {
    rate_per_sec: f64,
    capacity: f64,
    buckets: DashMap<String, Arc<TokenBucket>>,
}

impl HostLimiter {
    pub fn new(rate_per_sec: f64) -> Self {
        Self { rate_per_sec, capacity: rate_per_sec.max(1.0), buckets: DashMap::new() }
    }

    pub async fn acquire(&self, host: &str, ctx: &JobCtx) -> Result<(), NetError> {
        let bucket = self
            .buckets
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.rate_per_sec, self.capacity)))
            .clone();
        bucket.acquire(ctx).await
    }
}
