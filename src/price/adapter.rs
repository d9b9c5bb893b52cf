// `PriceAdapter` trait and a generic token-bucket rate limiter shared by
// adapter implementations. Generalizes the teacher's atomic used-weight
// tracker (`binance/rate_limit.rs`) into a source-agnostic bucket with a
// blocking wait on saturation, since price sources outside Binance don't
// all report rate-limit headers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::types::AssetClass;

use super::cache::PriceQuote;

#[async_trait]
pub trait PriceAdapter: Send + Sync {
    async fn fetch(&self, symbol: &str, hint: Option<AssetClass>) -> Option<PriceQuote>;
    async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, PriceQuote>;
}

/// Token bucket with a continuous refill rate, expressed as
/// `capacity` tokens per `window`. `acquire` blocks (via `tokio::time::sleep`)
/// until a token is available rather than rejecting the caller, so a
/// saturated adapter never drops a request — it just slows down.
pub struct TokenBucket {
    capacity: i64,
    window: Duration,
    tokens: AtomicI64,
    last_refill_nanos: AtomicI64,
}

impl TokenBucket {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity: capacity as i64,
            window,
            tokens: AtomicI64::new(capacity as i64),
            last_refill_nanos: AtomicI64::new(now_nanos()),
        }
    }

    fn refill(&self) {
        let now = now_nanos();
        let last = self.last_refill_nanos.load(Ordering::Relaxed);
        let elapsed_nanos = (now - last).max(0);
        let window_nanos = self.window.as_nanos() as i64;
        if window_nanos == 0 {
            return;
        }
        let refill_amount = (elapsed_nanos * self.capacity) / window_nanos;
        if refill_amount > 0 {
            let current = self.tokens.load(Ordering::Relaxed);
            let new_value = (current + refill_amount).min(self.capacity);
            self.tokens.store(new_value, Ordering::Relaxed);
            self.last_refill_nanos.store(now, Ordering::Relaxed);
        }
    }

    /// Block until a token is available, then consume it.
    pub async fn acquire(&self) {
        loop {
            self.refill();
            let current = self.tokens.load(Ordering::Relaxed);
            if current > 0
                && self
                    .tokens
                    .compare_exchange(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

fn now_nanos() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_allows_burst_up_to_capacity() {
        let bucket = TokenBucket::new(3, Duration::from_secs(60));
        bucket.acquire().await;
        bucket.acquire().await;
        bucket.acquire().await;
        assert_eq!(bucket.tokens.load(Ordering::Relaxed), 0);
    }
}
