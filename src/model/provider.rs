use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::EventKind;

/// A registered signal source. The raw API key and webhook secret are
/// generated once, at creation, and never stored or returned again — only
/// `api_key_salt` + `api_key_hash` and `webhook_secret` (used to sign
/// outbound payloads) persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub api_key_salt: String,
    pub api_key_hash: String,
    pub webhook_secret: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Provider {
    /// Create a new provider, returning it alongside the one-time raw API
    /// key the caller must hand to the signal source out of band.
    pub fn create(name: &str) -> (Self, String) {
        let raw_key = random_hex(32);
        let salt = random_hex(16);
        let webhook_secret = random_hex(32);
        let hash = hash_api_key(&salt, &raw_key);
        let provider = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            api_key_salt: salt,
            api_key_hash: hash,
            webhook_secret,
            is_active: true,
            created_at: Utc::now(),
        };
        (provider, raw_key)
    }

    pub fn matches_api_key(&self, candidate: &str) -> bool {
        let candidate_hash = hash_api_key(&self.api_key_salt, candidate);
        constant_time_eq(candidate_hash.as_bytes(), self.api_key_hash.as_bytes())
    }
}

pub fn hash_api_key(salt: &str, raw_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(raw_key.as_bytes());
    hex::encode(hasher.finalize())
}

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Byte-for-byte constant-time comparison, used for API-key hash matching
/// so timing does not leak how many leading bytes matched.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// A webhook endpoint a provider wants event notifications delivered to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub url: String,
    pub event_types: HashSet<EventKind>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub is_active: bool,
    pub consecutive_failures: u32,
    pub last_delivery_at: Option<DateTime<Utc>>,
}

impl WebhookSubscription {
    pub fn new(provider_id: Uuid, url: String, event_types: HashSet<EventKind>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id,
            url,
            event_types,
            headers: HashMap::new(),
            is_active: true,
            consecutive_failures: 0,
            last_delivery_at: None,
        }
    }

    pub fn is_circuit_broken(&self, max_consecutive_failures: u32) -> bool {
        self.consecutive_failures >= max_consecutive_failures
    }

    pub fn wants(&self, kind: EventKind) -> bool {
        self.event_types.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_returns_matching_raw_key() {
        let (provider, raw_key) = Provider::create("AutoBridge");
        assert!(provider.matches_api_key(&raw_key));
        assert!(!provider.matches_api_key("wrong-key"));
    }

    #[test]
    fn constant_time_eq_rejects_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
    }

    #[test]
    fn circuit_break_threshold() {
        let mut sub = WebhookSubscription::new(Uuid::new_v4(), "https://x".into(), HashSet::new());
        sub.consecutive_failures = 9;
        assert!(!sub.is_circuit_broken(10));
        sub.consecutive_failures = 10;
        assert!(sub.is_circuit_broken(10));
    }
}
