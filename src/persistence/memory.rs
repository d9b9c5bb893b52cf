// In-memory reference implementation of `PersistenceStore`, in the shape
// of `position_engine.rs`'s `RwLock<Vec<Position>>` split — plain guarded
// vectors/maps, no external dependency.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::{Provider, Signal, SignalEvent, WebhookSubscription};

use super::{DeliveryLogEntry, PersistenceStore, SignalFilter};

#[derive(Default)]
pub struct InMemoryStore {
    signals: RwLock<HashMap<Uuid, Signal>>,
    events: RwLock<HashMap<Uuid, Vec<SignalEvent>>>,
    providers: RwLock<HashMap<Uuid, Provider>>,
    subscriptions: RwLock<HashMap<Uuid, WebhookSubscription>>,
    delivery_logs: RwLock<Vec<DeliveryLogEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceStore for InMemoryStore {
    async fn insert_signal(&self, signal: Signal) -> anyhow::Result<()> {
        self.signals.write().insert(signal.id, signal);
        Ok(())
    }

    async fn update_signal(&self, signal: Signal) -> anyhow::Result<()> {
        self.signals.write().insert(signal.id, signal);
        Ok(())
    }

    async fn get_signal(&self, id: Uuid) -> anyhow::Result<Option<Signal>> {
        Ok(self.signals.read().get(&id).cloned())
    }

    async fn select_signals(&self, filter: SignalFilter) -> anyhow::Result<Vec<Signal>> {
        let signals = self.signals.read();
        let mut matched: Vec<Signal> = signals
            .values()
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .filter(|s| filter.provider_id.map_or(true, |pid| s.provider_id == pid))
            .filter(|s| {
                filter
                    .due_before
                    .map_or(true, |cutoff| s.next_poll_at.map_or(true, |t| t <= cutoff))
            })
            .cloned()
            .collect();
        matched.sort_by_key(|s| s.next_poll_at);
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn insert_event(&self, event: SignalEvent) -> anyhow::Result<()> {
        self.events.write().entry(event.signal_id).or_default().push(event);
        Ok(())
    }

    async fn events_for_signal(&self, signal_id: Uuid) -> anyhow::Result<Vec<SignalEvent>> {
        Ok(self.events.read().get(&signal_id).cloned().unwrap_or_default())
    }

    async fn insert_provider(&self, provider: Provider) -> anyhow::Result<()> {
        self.providers.write().insert(provider.id, provider);
        Ok(())
    }

    async fn get_provider(&self, id: Uuid) -> anyhow::Result<Option<Provider>> {
        Ok(self.providers.read().get(&id).cloned())
    }

    async fn find_provider_by_name(&self, name: &str) -> anyhow::Result<Option<Provider>> {
        Ok(self
            .providers
            .read()
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn list_active_providers(&self) -> anyhow::Result<Vec<Provider>> {
        Ok(self
            .providers
            .read()
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn insert_subscription(&self, subscription: WebhookSubscription) -> anyhow::Result<()> {
        self.subscriptions.write().insert(subscription.id, subscription);
        Ok(())
    }

    async fn list_subscriptions_for_provider(
        &self,
        provider_id: Uuid,
        active_only: bool,
    ) -> anyhow::Result<Vec<WebhookSubscription>> {
        Ok(self
            .subscriptions
            .read()
            .values()
            .filter(|s| s.provider_id == provider_id)
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect())
    }

    async fn update_subscription_counters(
        &self,
        subscription_id: Uuid,
        consecutive_failures: u32,
        last_delivery_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        if let Some(sub) = self.subscriptions.write().get_mut(&subscription_id) {
            sub.consecutive_failures = consecutive_failures;
            if last_delivery_at.is_some() {
                sub.last_delivery_at = last_delivery_at;
            }
        }
        Ok(())
    }

    async fn insert_delivery_log(&self, entry: DeliveryLogEntry) -> anyhow::Result<()> {
        self.delivery_logs.write().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetClass, Direction, SignalStatus};
    use serde_json::json;

    fn signal(provider_id: Uuid) -> Signal {
        Signal::new(
            provider_id,
            "BTCUSDT".into(),
            AssetClass::Crypto,
            Direction::Long,
            100.0,
            95.0,
            110.0,
            None,
            None,
            Utc::now(),
            json!({}),
            None,
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_then_get_roundtrips() {
        let store = InMemoryStore::new();
        let s = signal(Uuid::new_v4());
        let id = s.id;
        store.insert_signal(s).await.unwrap();
        let fetched = store.get_signal(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn select_signals_filters_by_status() {
        let store = InMemoryStore::new();
        let mut pending = signal(Uuid::new_v4());
        let mut active = signal(Uuid::new_v4());
        active.status = SignalStatus::Active;
        pending.status = SignalStatus::Pending;
        store.insert_signal(pending).await.unwrap();
        store.insert_signal(active).await.unwrap();

        let result = store
            .select_signals(SignalFilter {
                status: Some(SignalStatus::Active),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].status, SignalStatus::Active);
    }

    #[tokio::test]
    async fn subscription_counters_update_in_place() {
        let store = InMemoryStore::new();
        let sub = WebhookSubscription::new(Uuid::new_v4(), "https://example.com".into(), Default::default());
        let id = sub.id;
        store.insert_subscription(sub).await.unwrap();
        store.update_subscription_counters(id, 3, None).await.unwrap();
        let subs = store
            .list_subscriptions_for_provider(store.subscriptions.read().get(&id).unwrap().provider_id, false)
            .await
            .unwrap();
        assert_eq!(subs[0].consecutive_failures, 3);
    }
}
