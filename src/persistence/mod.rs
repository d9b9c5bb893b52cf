pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Provider, Signal, SignalEvent, WebhookSubscription};
use crate::types::SignalStatus;

#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub status: Option<SignalStatus>,
    pub due_before: Option<DateTime<Utc>>,
    pub provider_id: Option<Uuid>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DeliveryLogEntry {
    pub webhook_id: Uuid,
    pub event_id: Uuid,
    pub url: String,
    pub status_code: Option<u16>,
    pub success: bool,
    pub response_excerpt: Option<String>,
    pub logged_at: DateTime<Utc>,
}

/// Abstract persistence contract. The core engine never reaches for a
/// concrete database client — every subsystem holds an
/// `Arc<dyn PersistenceStore>` instead. `memory::InMemoryStore` is the
/// crate-provided implementation; a relational backend is a swap-in
/// implementer of this same trait and out of scope here.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    async fn insert_signal(&self, signal: Signal) -> anyhow::Result<()>;
    async fn update_signal(&self, signal: Signal) -> anyhow::Result<()>;
    async fn get_signal(&self, id: Uuid) -> anyhow::Result<Option<Signal>>;
    async fn select_signals(&self, filter: SignalFilter) -> anyhow::Result<Vec<Signal>>;

    async fn insert_event(&self, event: SignalEvent) -> anyhow::Result<()>;
    async fn events_for_signal(&self, signal_id: Uuid) -> anyhow::Result<Vec<SignalEvent>>;

    async fn insert_provider(&self, provider: Provider) -> anyhow::Result<()>;
    async fn get_provider(&self, id: Uuid) -> anyhow::Result<Option<Provider>>;
    async fn find_provider_by_name(&self, name: &str) -> anyhow::Result<Option<Provider>>;
    async fn list_active_providers(&self) -> anyhow::Result<Vec<Provider>>;

    async fn insert_subscription(&self, subscription: WebhookSubscription) -> anyhow::Result<()>;
    async fn list_subscriptions_for_provider(
        &self,
        provider_id: Uuid,
        active_only: bool,
    ) -> anyhow::Result<Vec<WebhookSubscription>>;
    async fn update_subscription_counters(
        &self,
        subscription_id: Uuid,
        consecutive_failures: u32,
        last_delivery_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;

    async fn insert_delivery_log(&self, entry: DeliveryLogEntry) -> anyhow::Result<()>;
}
