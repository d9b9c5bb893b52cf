// Loads a provider's active, non-circuit-broken subscriptions, builds the
// canonical signed payload, and dispatches delivery bounded by a
// semaphore — the Rust shape of the original bridge's
// `WebhookSenderPool` (`asyncio.Semaphore`, `gather(..., return_exceptions=True)`).

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::model::{Provider, Signal, SignalEvent};
use crate::persistence::PersistenceStore;

use super::delivery::DeliveryWorker;

#[derive(Debug, Serialize)]
struct CanonicalSignalView {
    symbol: String,
    direction: String,
    entry_price: f64,
    sl: f64,
    tp1: f64,
    tp2: Option<f64>,
    tp3: Option<f64>,
    rr_ratio: f64,
    risk_distance: f64,
    status: String,
    strategy_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct CanonicalPayload {
    event_id: Uuid,
    signal_id: Uuid,
    event_type: String,
    price: Option<f64>,
    timestamp: chrono::DateTime<chrono::Utc>,
    signal: CanonicalSignalView,
}

pub fn build_canonical_payload(event: &SignalEvent, signal: &Signal) -> String {
    let payload = CanonicalPayload {
        event_id: event.id,
        signal_id: signal.id,
        event_type: event.kind.to_string(),
        price: event.price,
        timestamp: event.event_timestamp,
        signal: CanonicalSignalView {
            symbol: signal.symbol.clone(),
            direction: signal.direction.to_string(),
            entry_price: signal.entry,
            sl: signal.sl,
            tp1: signal.tp1,
            tp2: signal.tp2,
            tp3: signal.tp3,
            rr_ratio: signal.rr_ratio,
            risk_distance: signal.risk_distance,
            status: signal.status.to_string(),
            strategy_name: signal.strategy_label.clone(),
        },
    };
    // `serde_json::to_string` already emits the compact, no-space form —
    // this exact string is what gets signed and sent.
    serde_json::to_string(&payload).expect("canonical payload is always serializable")
}

pub struct NotificationRouter {
    store: Arc<dyn PersistenceStore>,
    delivery: Arc<DeliveryWorker>,
    semaphore: Arc<Semaphore>,
    config: Arc<BridgeConfig>,
}

impl NotificationRouter {
    pub fn new(
        store: Arc<dyn PersistenceStore>,
        delivery: Arc<DeliveryWorker>,
        config: Arc<BridgeConfig>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.delivery_concurrency));
        Self {
            store,
            delivery,
            semaphore,
            config,
        }
    }

    /// Route a single signal event to every subscription that wants it.
    /// Each delivery runs as its own bounded-concurrency task; failures
    /// are independent (at-least-once, receivers dedupe on the
    /// idempotency key).
    pub async fn route(&self, event: &SignalEvent, signal: &Signal, provider: &Provider) {
        let subscriptions = match self
            .store
            .list_subscriptions_for_provider(provider.id, true)
            .await
        {
            Ok(subs) => subs,
            Err(e) => {
                warn!(provider_id = %provider.id, error = %e, "failed to load subscriptions");
                return;
            }
        };

        let wanted: Vec<_> = subscriptions
            .into_iter()
            .filter(|s| s.wants(event.kind))
            .collect();

        let body = build_canonical_payload(event, signal);
        let secret = provider.webhook_secret.clone();

        let mut handles = Vec::with_capacity(wanted.len());
        for subscription in wanted {
            if subscription.is_circuit_broken(self.config.max_consecutive_failures) {
                // No HTTP attempt, no log entry — subscription is skipped
                // entirely until a manual reset.
                continue;
            }

            let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let delivery = self.delivery.clone();
            let store = self.store.clone();
            let config = self.config.clone();
            let body = body.clone();
            let secret = secret.clone();
            let event_id = event.id;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = delivery
                    .deliver_with_retry(&subscription, event_id, &body, &secret, &config)
                    .await;

                let new_failures = if outcome.success {
                    0
                } else {
                    subscription.consecutive_failures + 1
                };
                let last_delivery_at = outcome.success.then(chrono::Utc::now);

                if let Err(e) = store
                    .update_subscription_counters(subscription.id, new_failures, last_delivery_at)
                    .await
                {
                    warn!(subscription_id = %subscription.id, error = %e, "failed to persist subscription counters");
                }

                let log_entry = delivery.build_log_entry(&subscription, event_id, &outcome);
                if let Err(e) = store.insert_delivery_log(log_entry).await {
                    warn!(subscription_id = %subscription.id, error = %e, "failed to persist delivery log");
                }

                debug!(
                    subscription_id = %subscription.id,
                    success = outcome.success,
                    attempts = outcome.attempts,
                    "webhook delivery finished"
                );
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}
