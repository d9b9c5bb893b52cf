// HMAC-signed webhook delivery with a fixed retry schedule and circuit
// breaker bookkeeping. Signing follows `binance/client.rs::sign`
// (`Hmac<Sha256>` + `hex::encode`); the retry/backoff and header shape
// follow the original bridge's `WebhookSender`.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::model::WebhookSubscription;
use crate::persistence::DeliveryLogEntry;

type HmacSha256 = Hmac<Sha256>;

const RESPONSE_EXCERPT_MAX_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_excerpt: Option<String>,
    pub attempts: u32,
}

pub fn sign_payload(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub struct DeliveryWorker {
    client: reqwest::Client,
}

impl DeliveryWorker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client"),
        }
    }

    /// Attempt delivery once; does not retry or touch circuit-breaker
    /// state. Called by `deliver_with_retry` for each attempt.
    #[instrument(skip(self, body, secret), fields(url = %subscription.url))]
    async fn send_once(
        &self,
        subscription: &WebhookSubscription,
        event_id: Uuid,
        body: &str,
        secret: &str,
    ) -> (bool, Option<u16>, Option<String>) {
        let signature = sign_payload(secret, body);
        let mut request = self
            .client
            .post(&subscription.url)
            .header("Content-Type", "application/json")
            .header("X-Idempotency-Key", event_id.to_string())
            .header("X-Signature", signature)
            .body(body.to_string());

        for (key, value) in &subscription.headers {
            request = request.header(key, value);
        }

        match request.send().await {
            Ok(resp) => {
                let status = resp.status();
                let success = status.as_u16() < 300;
                let excerpt = if success {
                    None
                } else {
                    resp.text()
                        .await
                        .ok()
                        .map(|t| t.chars().take(RESPONSE_EXCERPT_MAX_LEN).collect())
                };
                (success, Some(status.as_u16()), excerpt)
            }
            Err(e) => {
                warn!(error = %e, "webhook delivery request error");
                (false, None, Some(e.to_string().chars().take(RESPONSE_EXCERPT_MAX_LEN).collect()))
            }
        }
    }

    /// Deliver with the configured fixed retry schedule. The caller is
    /// responsible for the circuit-breaker check (see `router.rs`) — this
    /// always attempts at least once.
    pub async fn deliver_with_retry(
        &self,
        subscription: &WebhookSubscription,
        event_id: Uuid,
        body: &str,
        secret: &str,
        config: &BridgeConfig,
    ) -> DeliveryOutcome {
        let mut delays = vec![0u64];
        delays.extend(config.webhook_retry_delays_secs.iter().copied());

        let mut last_status = None;
        let mut last_excerpt = None;
        for (attempt, delay) in delays.iter().enumerate() {
            if *delay > 0 {
                tokio::time::sleep(Duration::from_secs(*delay)).await;
            }
            let (success, status, excerpt) = self.send_once(subscription, event_id, body, secret).await;
            last_status = status;
            last_excerpt = excerpt;
            if success {
                info!(url = %subscription.url, attempt, "webhook delivered");
                return DeliveryOutcome {
                    success: true,
                    status_code: status,
                    response_excerpt: None,
                    attempts: attempt as u32 + 1,
                };
            }
        }

        DeliveryOutcome {
            success: false,
            status_code: last_status,
            response_excerpt: last_excerpt,
            attempts: delays.len() as u32,
        }
    }

    pub fn build_log_entry(
        &self,
        subscription: &WebhookSubscription,
        event_id: Uuid,
        outcome: &DeliveryOutcome,
    ) -> DeliveryLogEntry {
        DeliveryLogEntry {
            webhook_id: subscription.id,
            event_id,
            url: subscription.url.clone(),
            status_code: outcome.status_code,
            success: outcome.success,
            response_excerpt: outcome.response_excerpt.clone(),
            logged_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_payload_is_deterministic_hex() {
        let sig1 = sign_payload("secret", "{\"a\":1}");
        let sig2 = sign_payload("secret", "{\"a\":1}");
        assert_eq!(sig1, sig2);
        assert!(sig1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig1.len(), 64);
    }

    #[test]
    fn sign_payload_differs_by_secret() {
        let sig1 = sign_payload("secret-a", "{\"a\":1}");
        let sig2 = sign_payload("secret-b", "{\"a\":1}");
        assert_ne!(sig1, sig2);
    }
}
