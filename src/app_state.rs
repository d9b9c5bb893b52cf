// =============================================================================
// Central Application State — the signal bridge's single source of truth
// =============================================================================
//
// Every subsystem holds an `Arc` into `AppState` or is reachable through
// one of its fields; AppState ties them together and exposes a version
// counter + snapshot for the read-only REST surface.
//
// Thread safety:
//   - Atomic counter for lock-free version tracking.
//   - parking_lot::RwLock for mutable shared state (config, error ring
//     buffer).
//   - Arc wrappers for subsystem engines that manage their own interior
//     mutability (persistence, price cache, notification router).
// =============================================================================

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::config::BridgeConfig;
use crate::notify::{DeliveryWorker, NotificationRouter};
use crate::persistence::PersistenceStore;
use crate::price::{PriceAdapter, PriceCache};

const MAX_RECENT_ERRORS: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct RecentError {
    pub message: String,
    pub at: DateTime<Utc>,
}

pub struct AppState {
    pub config: RwLock<BridgeConfig>,
    pub store: Arc<dyn PersistenceStore>,
    pub price_cache: Arc<PriceCache>,
    pub price_adapter: Arc<dyn PriceAdapter>,
    pub delivery: Arc<DeliveryWorker>,
    pub notification_router: Arc<NotificationRouter>,
    state_version: AtomicU64,
    recent_errors: RwLock<VecDeque<RecentError>>,
}

impl AppState {
    pub fn new(
        config: BridgeConfig,
        store: Arc<dyn PersistenceStore>,
        price_cache: Arc<PriceCache>,
        price_adapter: Arc<dyn PriceAdapter>,
    ) -> Arc<Self> {
        let shared_config = Arc::new(config.clone());
        let delivery = Arc::new(DeliveryWorker::new(std::time::Duration::from_secs(
            config.webhook_timeout_secs,
        )));
        let notification_router = Arc::new(NotificationRouter::new(
            store.clone(),
            delivery.clone(),
            shared_config,
        ));
        Arc::new(Self {
            config: RwLock::new(config),
            store,
            price_cache,
            price_adapter,
            delivery,
            notification_router,
            state_version: AtomicU64::new(0),
            recent_errors: RwLock::new(VecDeque::with_capacity(MAX_RECENT_ERRORS)),
        })
    }

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    pub fn push_error(&self, message: impl Into<String>) {
        let mut errors = self.recent_errors.write();
        if errors.len() >= MAX_RECENT_ERRORS {
            errors.pop_front();
        }
        errors.push_back(RecentError {
            message: message.into(),
            at: Utc::now(),
        });
    }

    pub fn recent_errors(&self) -> Vec<RecentError> {
        self.recent_errors.read().iter().cloned().collect()
    }

    pub fn build_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            state_version: self.current_state_version(),
            recent_errors: self.recent_errors(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub recent_errors: Vec<RecentError>,
}
