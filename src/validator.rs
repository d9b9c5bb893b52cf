// Pure validation pass over an already-constructed `Signal`. `Signal::new`
// only refuses structurally broken input; ordering sanity, RR ratio, risk
// distance, latency, precision and duplicate checks all live here so an
// inverted-ordering or zero-risk-distance signal still constructs, persists
// as INVALID, and comes back as a 422 rather than a pre-persistence 400.

use chrono::{DateTime, Utc};

use crate::config::BridgeConfig;
use crate::model::Signal;
use crate::types::Direction;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub confidence_score: i32,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// LONG: entry < tp1 < tp2? < tp3?, and sl < entry. SHORT: reversed. Each
/// pair is checked (and reported) independently, same as the original's
/// per-level comparisons, rather than collapsing into one "bad ordering"
/// verdict.
fn check_ordering(signal: &Signal, errors: &mut Vec<String>) {
    match signal.direction {
        Direction::Long => {
            if signal.entry <= signal.sl {
                errors.push(format!(
                    "LONG entry ({}) must be above sl ({})",
                    signal.entry, signal.sl
                ));
            }
            if signal.tp1 <= signal.entry {
                errors.push(format!(
                    "tp1 ({}) must be above entry ({})",
                    signal.tp1, signal.entry
                ));
            }
            if let Some(tp2) = signal.tp2 {
                if tp2 <= signal.tp1 {
                    errors.push(format!("tp2 ({tp2}) must be above tp1 ({})", signal.tp1));
                }
            }
            if let (Some(tp2), Some(tp3)) = (signal.tp2, signal.tp3) {
                if tp3 <= tp2 {
                    errors.push(format!("tp3 ({tp3}) must be above tp2 ({tp2})"));
                }
            }
        }
        Direction::Short => {
            if signal.entry >= signal.sl {
                errors.push(format!(
                    "SHORT entry ({}) must be below sl ({})",
                    signal.entry, signal.sl
                ));
            }
            if signal.tp1 >= signal.entry {
                errors.push(format!(
                    "tp1 ({}) must be below entry ({})",
                    signal.tp1, signal.entry
                ));
            }
            if let Some(tp2) = signal.tp2 {
                if tp2 >= signal.tp1 {
                    errors.push(format!("tp2 ({tp2}) must be below tp1 ({})", signal.tp1));
                }
            }
            if let (Some(tp2), Some(tp3)) = (signal.tp2, signal.tp3) {
                if tp3 >= tp2 {
                    errors.push(format!("tp3 ({tp3}) must be below tp2 ({tp2})"));
                }
            }
        }
    }
}

fn decimal_places(value: f64) -> u32 {
    let s = format!("{value}");
    match s.split_once('.') {
        Some((_, frac)) => frac.trim_end_matches('0').len() as u32,
        None => 0,
    }
}

/// Validate a signal against the given config at `now`. Pure: takes no
/// lock, performs no I/O.
pub fn validate(
    signal: &Signal,
    config: &BridgeConfig,
    now: DateTime<Utc>,
    recent_same_symbol: &[&Signal],
) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // (1) Ordering: entry/sl/tp1/tp2?/tp3? must be strictly increasing for
    // LONG, strictly decreasing for SHORT. A zero risk distance (entry ==
    // sl) is caught here too, since it makes rr_ratio meaningless.
    check_ordering(signal, &mut errors);

    // (2) RR ratio
    if signal.rr_ratio < config.min_rr_ratio {
        errors.push(format!(
            "rr_ratio {:.3} below minimum {:.3}",
            signal.rr_ratio, config.min_rr_ratio
        ));
    } else if signal.rr_ratio < config.warn_rr_ratio {
        warnings.push(format!(
            "rr_ratio {:.3} below warning threshold {:.3}",
            signal.rr_ratio, config.warn_rr_ratio
        ));
    } else if signal.rr_ratio > config.warn_rr_ceiling {
        warnings.push(format!(
            "rr_ratio {:.3} unusually high (> {:.3})",
            signal.rr_ratio, config.warn_rr_ceiling
        ));
    }

    // (3) Risk distance vs per-asset-class ceiling
    let r_pct = (signal.risk_distance / signal.entry) * 100.0;
    let ceiling = config.max_risk_pct_for(signal.asset_class);
    if r_pct > ceiling {
        errors.push(format!(
            "risk distance {:.3}% exceeds {} ceiling of {:.3}%",
            r_pct, signal.asset_class, ceiling
        ));
    } else if r_pct < config.min_risk_pct_warn {
        warnings.push(format!(
            "risk distance {:.3}% is unusually tight for {}",
            r_pct, signal.asset_class
        ));
    }

    // (4) Latency
    let age_secs = (now - signal.entry_timestamp).num_seconds();
    if age_secs > config.max_latency_secs {
        errors.push(format!(
            "signal age {age_secs}s exceeds max latency {}s",
            config.max_latency_secs
        ));
    } else if age_secs > config.warn_latency_secs {
        warnings.push(format!(
            "signal age {age_secs}s exceeds warn latency {}s",
            config.warn_latency_secs
        ));
    }

    // (5) Precision
    let ceiling_dp = config.precision_ceiling_for(signal.asset_class);
    let max_dp = [signal.entry, signal.sl, signal.tp1]
        .into_iter()
        .chain(signal.tp2)
        .chain(signal.tp3)
        .map(decimal_places)
        .max()
        .unwrap_or(0);
    if max_dp > ceiling_dp {
        warnings.push(format!(
            "price precision {max_dp} decimal places exceeds {ceiling_dp} for {}",
            signal.asset_class
        ));
    }

    // (6) Duplicate detection: same symbol + direction within tolerance of
    // entry price in the recent window.
    let tolerance = signal.entry * (config.duplicate_price_tolerance_pct / 100.0);
    for other in recent_same_symbol {
        if other.id == signal.id {
            continue;
        }
        if other.symbol != signal.symbol || other.direction != signal.direction {
            continue;
        }
        let age = (signal.entry_timestamp - other.entry_timestamp)
            .num_seconds()
            .abs();
        if age > config.duplicate_window_secs {
            continue;
        }
        if (other.entry - signal.entry).abs() <= tolerance {
            warnings.push(format!(
                "possible duplicate of signal {} ({} {} @ {})",
                other.id, other.symbol, other.direction, other.entry
            ));
        }
    }

    let confidence_score =
        (100 - 15 * errors.len() as i32 - 5 * warnings.len() as i32).max(0);

    ValidationResult {
        errors,
        warnings,
        confidence_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AssetClass;
    use serde_json::json;
    use uuid::Uuid;

    fn make_signal(entry: f64, sl: f64, tp1: f64, class: AssetClass) -> Signal {
        Signal::new(
            Uuid::new_v4(),
            "BTCUSDT".into(),
            class,
            Direction::Long,
            entry,
            sl,
            tp1,
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
    fn healthy_signal_has_no_errors() {
        let signal = make_signal(100.0, 98.0, 106.0, AssetClass::Crypto);
        let cfg = BridgeConfig::default();
        let result = validate(&signal, &cfg, Utc::now(), &[]);
        assert!(result.is_valid());
        assert_eq!(result.confidence_score, 100);
    }

    #[test]
    fn inverted_ordering_is_rejected() {
        // tp1 below entry for a LONG signal: constructs fine (Signal::new
        // no longer enforces ordering) but must fail validation here.
        let signal = make_signal(100.0, 95.0, 90.0, AssetClass::Crypto);
        let cfg = BridgeConfig::default();
        let result = validate(&signal, &cfg, Utc::now(), &[]);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("tp1")));
    }

    #[test]
    fn zero_risk_distance_is_rejected() {
        let signal = make_signal(100.0, 100.0, 110.0, AssetClass::Crypto);
        let cfg = BridgeConfig::default();
        let result = validate(&signal, &cfg, Utc::now(), &[]);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("must be above sl")));
    }

    #[test]
    fn low_rr_ratio_is_rejected() {
        let signal = make_signal(100.0, 90.0, 102.0, AssetClass::Crypto);
        let cfg = BridgeConfig::default();
        let result = validate(&signal, &cfg, Utc::now(), &[]);
        assert!(!result.is_valid());
    }

    #[test]
    fn excessive_risk_distance_rejected_for_forex() {
        let signal = make_signal(1.1000, 1.0500, 1.2000, AssetClass::Forex);
        let cfg = BridgeConfig::default();
        let result = validate(&signal, &cfg, Utc::now(), &[]);
        assert!(!result.is_valid());
    }

    #[test]
    fn stale_signal_rejected_on_latency() {
        let mut signal = make_signal(100.0, 98.0, 106.0, AssetClass::Crypto);
        signal.entry_timestamp = Utc::now() - chrono::Duration::seconds(400);
        let cfg = BridgeConfig::default();
        let result = validate(&signal, &cfg, Utc::now(), &[]);
        assert!(!result.is_valid());
    }

    #[test]
    fn confidence_score_floors_at_zero() {
        let mut signal = make_signal(100.0, 90.0, 101.0, AssetClass::Forex);
        signal.entry_timestamp = Utc::now() - chrono::Duration::seconds(10000);
        let cfg = BridgeConfig::default();
        let result = validate(&signal, &cfg, Utc::now(), &[]);
        assert_eq!(result.confidence_score, 0);
    }
}
