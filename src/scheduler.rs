// Adaptive polling scheduler: picks a proximity zone and next poll time
// for an open signal based on how close the current price is to its
// nearest TP/SL level relative to the overall TP1-SL range.

use chrono::{DateTime, Duration, Utc};

use crate::config::BridgeConfig;
use crate::model::Signal;
use crate::types::ProximityZone;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleResult {
    pub zone: ProximityZone,
    pub next_poll_at: DateTime<Utc>,
    pub distance_ratio: f64,
}

/// Compute the proximity zone and next poll time for `signal` given
/// `current_price`, per the ratio formula:
/// `ratio = min_distance(price, levels) / |max(tp1, sl) - min(tp1, sl)|`.
pub fn next_poll(signal: &Signal, current_price: f64, config: &BridgeConfig, now: DateTime<Utc>) -> ScheduleResult {
    let mut levels = vec![signal.sl, signal.tp1];
    if let Some(tp2) = signal.tp2 {
        levels.push(tp2);
    }
    if let Some(tp3) = signal.tp3 {
        levels.push(tp3);
    }

    let min_distance = levels
        .iter()
        .map(|level| (current_price - level).abs())
        .fold(f64::MAX, f64::min);

    let range = (signal.tp1.max(signal.sl) - signal.tp1.min(signal.sl)).max(f64::EPSILON);
    let ratio = min_distance / range;

    let zone = if ratio <= config.proximity_close_ratio {
        ProximityZone::Close
    } else if ratio <= config.proximity_mid_ratio {
        ProximityZone::Mid
    } else {
        ProximityZone::Far
    };

    let raw_interval = match zone {
        ProximityZone::Close => config.poll_interval_close_secs,
        ProximityZone::Mid => config.poll_interval_mid_secs,
        ProximityZone::Far => config.poll_interval_far_secs,
    };
    let interval = raw_interval
        .max(config.min_poll_interval_secs)
        .min(config.max_poll_interval_secs);

    ScheduleResult {
        zone,
        next_poll_at: now + Duration::seconds(interval as i64),
        distance_ratio: ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetClass, Direction};
    use serde_json::json;
    use uuid::Uuid;

    fn signal() -> Signal {
        Signal::new(
            Uuid::new_v4(),
            "BTCUSDT".into(),
            AssetClass::Crypto,
            Direction::Long,
            100.0,
            90.0,
            120.0,
            None,
            None,
            Utc::now(),
            json!({}),
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn close_to_sl_gives_close_zone() {
        let s = signal();
        let cfg = BridgeConfig::default();
        let result = next_poll(&s, 91.0, &cfg, Utc::now());
        assert_eq!(result.zone, ProximityZone::Close);
    }

    #[test]
    fn midpoint_gives_far_zone() {
        let s = signal();
        let cfg = BridgeConfig::default();
        let result = next_poll(&s, 105.0, &cfg, Utc::now());
        assert_eq!(result.zone, ProximityZone::Far);
    }

    #[test]
    fn interval_is_monotone_nondecreasing_in_ratio() {
        let s = signal();
        let cfg = BridgeConfig::default();
        let close = next_poll(&s, 91.0, &cfg, Utc::now());
        let mid = next_poll(&s, 97.0, &cfg, Utc::now());
        let far = next_poll(&s, 105.0, &cfg, Utc::now());
        assert!(close.next_poll_at <= mid.next_poll_at);
        assert!(mid.next_poll_at <= far.next_poll_at);
    }
}
