// Per-process TTL cache of the last known quote per symbol.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::DetectionSource;

#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub price: f64,
    pub source: DetectionSource,
    pub fetched_at: Instant,
}

struct Entry {
    quote: PriceQuote,
}

pub struct PriceCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, symbol: &str) -> Option<PriceQuote> {
        let entries = self.entries.read();
        entries.get(symbol).and_then(|e| {
            if e.quote.fetched_at.elapsed() <= self.ttl {
                Some(e.quote)
            } else {
                None
            }
        })
    }

    pub fn put(&self, symbol: &str, quote: PriceQuote) {
        self.entries
            .write()
            .insert(symbol.to_string(), Entry { quote });
    }

    /// Insert without a freshness check, used by streaming adapters that
    /// push quotes as they arrive rather than on a pull cycle.
    pub fn put_streamed(&self, symbol: &str, price: f64) {
        self.put(
            symbol,
            PriceQuote {
                price,
                source: DetectionSource::Polling,
                fetched_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_quote_is_returned() {
        let cache = PriceCache::new(Duration::from_secs(10));
        cache.put_streamed("BTCUSDT", 50000.0);
        let q = cache.get("BTCUSDT").unwrap();
        assert_eq!(q.price, 50000.0);
    }

    #[test]
    fn expired_quote_is_not_returned() {
        let cache = PriceCache::new(Duration::from_millis(1));
        cache.put_streamed("BTCUSDT", 50000.0);
        std::thread::sleep(Duration::from_millis(10));
        assert!(cache.get("BTCUSDT").is_none());
    }

    #[test]
    fn missing_symbol_returns_none() {
        let cache = PriceCache::new(Duration::from_secs(10));
        assert!(cache.get("ETHUSDT").is_none());
    }
}
