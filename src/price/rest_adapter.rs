// Generic REST-polling price adapter. Talks to any HTTP price source that
// returns `{"symbol": ..., "price": ...}`-shaped JSON per symbol, the way
// `binance/client.rs` talks to Binance's REST API (`reqwest::Client`,
// per-method `#[instrument]`, `anyhow::Context` error wrapping).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::types::{AssetClass, DetectionSource};

use super::adapter::{PriceAdapter, TokenBucket};
use super::cache::PriceQuote;

pub struct RestPriceAdapter {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: TokenBucket,
}

impl RestPriceAdapter {
    pub fn new(base_url: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
            rate_limiter: TokenBucket::new(requests_per_minute, Duration::from_secs(60)),
        }
    }

    #[instrument(skip(self), name = "rest_adapter::fetch_one")]
    async fn fetch_one(&self, symbol: &str) -> Option<PriceQuote> {
        self.rate_limiter.acquire().await;
        let url = format!("{}/price?symbol={}", self.base_url, symbol);
        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(symbol, error = %e, "price fetch failed");
                return None;
            }
        };
        let body: serde_json::Value = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(symbol, error = %e, "price response decode failed");
                return None;
            }
        };
        let price = body.get("price").and_then(|v| v.as_f64())?;
        Some(PriceQuote {
            price,
            source: DetectionSource::Polling,
            fetched_at: std::time::Instant::now(),
        })
    }
}

#[async_trait]
impl PriceAdapter for RestPriceAdapter {
    async fn fetch(&self, symbol: &str, _hint: Option<AssetClass>) -> Option<PriceQuote> {
        self.fetch_one(symbol).await
    }

    /// Failures for individual symbols are swallowed — a missing quote for
    /// one symbol never blocks the others in the batch.
    async fn fetch_batch(&self, symbols: &[String]) -> HashMap<String, PriceQuote> {
        let mut out = HashMap::new();
        for symbol in symbols {
            if let Some(quote) = self.fetch_one(symbol).await {
                out.insert(symbol.clone(), quote);
            }
        }
        out
    }
}
