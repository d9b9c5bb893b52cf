// =============================================================================
// Bridge configuration — closed, typed tunables with atomic save
// =============================================================================
//
// Every knob the bridge recognizes lives here as a named field, never in an
// open-ended map. Persistence uses the same atomic tmp + rename pattern the
// rest of this codebase's config layer uses, so a crash mid-write never
// corrupts the file on disk. All fields carry `#[serde(default = "...")]`
// so a config file missing newer fields still loads.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::AssetClass;

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_risk_pct() -> HashMap<String, f64> {
    [
        (AssetClass::Futures.to_string(), 3.0),
        (AssetClass::Forex.to_string(), 2.0),
        (AssetClass::Crypto.to_string(), 15.0),
        (AssetClass::Stocks.to_string(), 5.0),
        (AssetClass::Other.to_string(), 10.0),
    ]
    .into_iter()
    .collect()
}

fn default_min_risk_pct_warn() -> f64 {
    0.1
}

fn default_min_rr_ratio() -> f64 {
    0.5
}

fn default_warn_rr_ratio() -> f64 {
    1.0
}

fn default_warn_rr_ceiling() -> f64 {
    10.0
}

fn default_max_latency_secs() -> i64 {
    300
}

fn default_warn_latency_secs() -> i64 {
    120
}

fn default_duplicate_window_secs() -> i64 {
    300
}

fn default_duplicate_price_tolerance_pct() -> f64 {
    0.1
}

fn default_proximity_close_ratio() -> f64 {
    0.10
}

fn default_proximity_mid_ratio() -> f64 {
    0.30
}

fn default_poll_interval_close_secs() -> u64 {
    5
}

fn default_poll_interval_mid_secs() -> u64 {
    15
}

fn default_poll_interval_far_secs() -> u64 {
    60
}

fn default_min_poll_interval_secs() -> u64 {
    1
}

fn default_max_poll_interval_secs() -> u64 {
    300
}

fn default_monitor_cycle_secs() -> u64 {
    3
}

fn default_monitor_batch_limit() -> usize {
    200
}

fn default_price_cache_ttl_secs() -> u64 {
    10
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_webhook_retry_delays_secs() -> Vec<u64> {
    vec![1, 5, 30]
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_delivery_concurrency() -> usize {
    10
}

fn default_dev_webhook_secret() -> String {
    "dev-only-change-me".to_string()
}

fn default_precision_ceiling() -> HashMap<String, u32> {
    [
        (AssetClass::Futures.to_string(), 2),
        (AssetClass::Forex.to_string(), 5),
        (AssetClass::Crypto.to_string(), 8),
        (AssetClass::Stocks.to_string(), 2),
        (AssetClass::Other.to_string(), 8),
    ]
    .into_iter()
    .collect()
}

/// Closed set of tunables recognized by the bridge (spec §6 "Configuration
/// options recognized").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Per-asset-class max risk distance, as a percentage of entry price.
    #[serde(default = "default_max_risk_pct")]
    pub max_risk_pct: HashMap<String, f64>,

    /// Below this risk-distance percentage, the validator emits a warning
    /// (the stop may be unrealistically tight for the instrument).
    #[serde(default = "default_min_risk_pct_warn")]
    pub min_risk_pct_warn: f64,

    #[serde(default = "default_min_rr_ratio")]
    pub min_rr_ratio: f64,
    #[serde(default = "default_warn_rr_ratio")]
    pub warn_rr_ratio: f64,
    #[serde(default = "default_warn_rr_ceiling")]
    pub warn_rr_ceiling: f64,

    #[serde(default = "default_max_latency_secs")]
    pub max_latency_secs: i64,
    #[serde(default = "default_warn_latency_secs")]
    pub warn_latency_secs: i64,

    #[serde(default = "default_precision_ceiling")]
    pub precision_ceiling: HashMap<String, u32>,

    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: i64,
    #[serde(default = "default_duplicate_price_tolerance_pct")]
    pub duplicate_price_tolerance_pct: f64,

    #[serde(default = "default_proximity_close_ratio")]
    pub proximity_close_ratio: f64,
    #[serde(default = "default_proximity_mid_ratio")]
    pub proximity_mid_ratio: f64,

    #[serde(default = "default_poll_interval_close_secs")]
    pub poll_interval_close_secs: u64,
    #[serde(default = "default_poll_interval_mid_secs")]
    pub poll_interval_mid_secs: u64,
    #[serde(default = "default_poll_interval_far_secs")]
    pub poll_interval_far_secs: u64,
    #[serde(default = "default_min_poll_interval_secs")]
    pub min_poll_interval_secs: u64,
    #[serde(default = "default_max_poll_interval_secs")]
    pub max_poll_interval_secs: u64,

    #[serde(default = "default_monitor_cycle_secs")]
    pub monitor_cycle_secs: u64,
    #[serde(default = "default_monitor_batch_limit")]
    pub monitor_batch_limit: usize,
    #[serde(default = "default_price_cache_ttl_secs")]
    pub price_cache_ttl_secs: u64,

    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
    #[serde(default = "default_webhook_retry_delays_secs")]
    pub webhook_retry_delays_secs: Vec<u64>,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    #[serde(default = "default_delivery_concurrency")]
    pub delivery_concurrency: usize,

    /// Default HMAC secret used only for the auto-created "AutoBridge"
    /// provider in development. Real providers get their own random secret
    /// at creation time (see `model::provider::Provider::create`).
    #[serde(default = "default_dev_webhook_secret")]
    pub dev_webhook_secret: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_risk_pct: default_max_risk_pct(),
            min_risk_pct_warn: default_min_risk_pct_warn(),
            min_rr_ratio: default_min_rr_ratio(),
            warn_rr_ratio: default_warn_rr_ratio(),
            warn_rr_ceiling: default_warn_rr_ceiling(),
            max_latency_secs: default_max_latency_secs(),
            warn_latency_secs: default_warn_latency_secs(),
            precision_ceiling: default_precision_ceiling(),
            duplicate_window_secs: default_duplicate_window_secs(),
            duplicate_price_tolerance_pct: default_duplicate_price_tolerance_pct(),
            proximity_close_ratio: default_proximity_close_ratio(),
            proximity_mid_ratio: default_proximity_mid_ratio(),
            poll_interval_close_secs: default_poll_interval_close_secs(),
            poll_interval_mid_secs: default_poll_interval_mid_secs(),
            poll_interval_far_secs: default_poll_interval_far_secs(),
            min_poll_interval_secs: default_min_poll_interval_secs(),
            max_poll_interval_secs: default_max_poll_interval_secs(),
            monitor_cycle_secs: default_monitor_cycle_secs(),
            monitor_batch_limit: default_monitor_batch_limit(),
            price_cache_ttl_secs: default_price_cache_ttl_secs(),
            webhook_timeout_secs: default_webhook_timeout_secs(),
            webhook_retry_delays_secs: default_webhook_retry_delays_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
            delivery_concurrency: default_delivery_concurrency(),
            dev_webhook_secret: default_dev_webhook_secret(),
        }
    }
}

impl BridgeConfig {
    pub fn max_risk_pct_for(&self, class: AssetClass) -> f64 {
        self.max_risk_pct
            .get(&class.to_string())
            .copied()
            .unwrap_or(10.0)
    }

    pub fn precision_ceiling_for(&self, class: AssetClass) -> u32 {
        self.precision_ceiling
            .get(&class.to_string())
            .copied()
            .unwrap_or(8)
    }

    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bridge config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse bridge config from {}", path.display()))?;
        info!(path = %path.display(), "bridge config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("failed to serialize bridge config")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;
        info!(path = %path.display(), "bridge config saved (atomic)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.min_rr_ratio, 0.5);
        assert_eq!(cfg.max_consecutive_failures, 10);
        assert_eq!(cfg.webhook_retry_delays_secs, vec![1, 5, 30]);
        assert_eq!(cfg.max_risk_pct_for(AssetClass::Crypto), 15.0);
        assert_eq!(cfg.max_risk_pct_for(AssetClass::Forex), 2.0);
    }

    #[test]
    fn deserialize_empty_json_uses_defaults() {
        let cfg: BridgeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.proximity_close_ratio, 0.10);
        assert_eq!(cfg.poll_interval_far_secs, 60);
    }

    #[test]
    fn deserialize_partial_json_fills_defaults() {
        let json = r#"{ "min_rr_ratio": 0.8 }"#;
        let cfg: BridgeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.min_rr_ratio, 0.8);
        assert_eq!(cfg.max_consecutive_failures, 10);
    }

    #[test]
    fn roundtrip_serialization() {
        let cfg = BridgeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: BridgeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.min_rr_ratio, cfg2.min_rr_ratio);
        assert_eq!(cfg.webhook_retry_delays_secs, cfg2.webhook_retry_delays_secs);
    }

    #[test]
    fn save_then_load_roundtrips_through_disk() {
        let cfg = BridgeConfig::default();
        let dir = std::env::temp_dir().join(format!("aurora-bridge-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bridge_config.json");
        cfg.save(&path).unwrap();
        let loaded = BridgeConfig::load(&path).unwrap();
        assert_eq!(loaded.min_rr_ratio, cfg.min_rr_ratio);
        std::fs::remove_dir_all(&dir).ok();
    }
}
