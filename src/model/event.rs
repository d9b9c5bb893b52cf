use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{DetectionSource, EventKind};

/// Append-only audit record of everything that happened to a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub id: Uuid,
    pub signal_id: Uuid,
    pub kind: EventKind,
    pub price: Option<f64>,
    pub source: DetectionSource,
    pub event_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl SignalEvent {
    pub fn new(
        signal_id: Uuid,
        kind: EventKind,
        price: Option<f64>,
        source: DetectionSource,
        event_timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_id,
            kind,
            price,
            source,
            event_timestamp,
            metadata,
        }
    }
}
