// Crypto streaming adapter: one reconnecting task per symbol, writing
// every tick into the shared `PriceCache`. Mirrors main.rs's per-symbol
// `loop { if let Err(e) = run_stream(...).await { error!(...) } sleep(...) }`
// shape, with the exponential backoff schedule from the original bridge's
// binance_ws.py reconnect loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::cache::PriceCache;

const RECONNECT_SCHEDULE_SECS: [u64; 7] = [1, 2, 4, 8, 16, 32, 60];
const PING_INTERVAL_SECS: u64 = 30;

/// Spawn one reconnecting stream task per symbol against `stream_url_for`.
/// Each task runs until the process shuts down; `cache` is shared across
/// all of them.
pub fn spawn_symbol_streams(
    symbols: Vec<String>,
    stream_url_for: impl Fn(&str) -> String + Send + Sync + 'static,
    cache: Arc<PriceCache>,
) {
    let stream_url_for = Arc::new(stream_url_for);
    for symbol in symbols {
        let cache = cache.clone();
        let stream_url_for = stream_url_for.clone();
        tokio::spawn(async move {
            run_symbol_stream(symbol, stream_url_for, cache).await;
        });
    }
}

async fn run_symbol_stream(
    symbol: String,
    stream_url_for: Arc<impl Fn(&str) -> String + Send + Sync + 'static>,
    cache: Arc<PriceCache>,
) {
    let mut attempt = 0usize;
    loop {
        let url = stream_url_for(&symbol);
        info!(symbol = %symbol, url = %url, "connecting price stream");
        match run_until_disconnect(&symbol, &url, &cache).await {
            Ok(()) => {
                debug!(symbol = %symbol, "price stream closed cleanly");
                attempt = 0;
            }
            Err(e) => {
                let delay = RECONNECT_SCHEDULE_SECS[attempt.min(RECONNECT_SCHEDULE_SECS.len() - 1)];
                warn!(symbol = %symbol, error = %e, delay_secs = delay, "price stream disconnected, reconnecting");
                attempt += 1;
                tokio::time::sleep(Duration::from_secs(delay)).await;
                continue;
            }
        }
    }
}

async fn run_until_disconnect(symbol: &str, url: &str, cache: &Arc<PriceCache>) -> anyhow::Result<()> {
    let (ws_stream, _) = connect_async(url).await?;
    let (mut write, mut read) = ws_stream.split();
    let mut ping_interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping_interval.tick().await;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(price) = parse_trade_price(&text) {
                            cache.put_streamed(symbol, price);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        anyhow::bail!("stream closed by remote");
                    }
                    Some(Err(e)) => {
                        anyhow::bail!("stream read error: {e}");
                    }
                    _ => {}
                }
            }
            _ = ping_interval.tick() => {
                use futures_util::SinkExt;
                if write.send(Message::Ping(Vec::new())).await.is_err() {
                    anyhow::bail!("ping send failed");
                }
            }
        }
    }
}

fn parse_trade_price(text: &str) -> Option<f64> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    value
        .get("price")
        .or_else(|| value.get("p"))
        .and_then(|v| v.as_str().and_then(|s| s.parse::<f64>().ok()).or_else(|| v.as_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_price_field() {
        assert_eq!(parse_trade_price(r#"{"price": 50000.5}"#), Some(50000.5));
    }

    #[test]
    fn parses_string_price_field_binance_style() {
        assert_eq!(parse_trade_price(r#"{"p": "50000.50"}"#), Some(50000.50));
    }

    #[test]
    fn returns_none_for_unrelated_message() {
        assert_eq!(parse_trade_price(r#"{"event": "ping"}"#), None);
    }
}
