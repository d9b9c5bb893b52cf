// Derives a terminal (or in-flight) outcome for a signal from its event
// history, and aggregates outcomes across signals into summary stats.

use std::collections::HashMap;

use chrono::Duration;
use uuid::Uuid;

use crate::model::{Signal, SignalEvent};
use crate::types::{EventKind, OutcomeResult, SignalStatus};

#[derive(Debug, Clone)]
pub struct SignalOutcome {
    pub signal_id: Uuid,
    pub result: OutcomeResult,
    pub exit_price: Option<f64>,
    pub r_value: Option<f64>,
    pub tp_levels_hit: Vec<u8>,
    pub mfe: Option<f64>,
    pub mae: Option<f64>,
    pub duration: Option<Duration>,
}

/// Resolve a single signal's outcome from its current state plus its
/// event history (used for MFE/MAE and duration, which the `Signal`
/// struct itself does not retain).
pub fn resolve(signal: &Signal, events: &[SignalEvent]) -> SignalOutcome {
    let tp_levels_hit = events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Tp1Hit => Some(1),
            EventKind::Tp2Hit => Some(2),
            EventKind::Tp3Hit => Some(3),
            _ => None,
        })
        .collect::<Vec<u8>>();

    let result = match signal.status {
        SignalStatus::SlHit => {
            if tp_levels_hit.is_empty() {
                OutcomeResult::Loss
            } else {
                OutcomeResult::Partial
            }
        }
        SignalStatus::Tp3Hit => OutcomeResult::Win,
        SignalStatus::Closed => {
            if !tp_levels_hit.is_empty() {
                OutcomeResult::Win
            } else {
                OutcomeResult::Closed
            }
        }
        SignalStatus::Invalid => OutcomeResult::Closed,
        SignalStatus::Pending
        | SignalStatus::Active
        | SignalStatus::Tp1Hit
        | SignalStatus::Tp2Hit => OutcomeResult::Open,
    };

    let (mfe, mae) = compute_mfe_mae(signal, events);

    let entry_hit_at = events
        .iter()
        .find(|e| e.kind == EventKind::EntryHit)
        .map(|e| e.event_timestamp);
    let duration = match (entry_hit_at, signal.closure_timestamp) {
        (Some(start), Some(end)) => Some(end - start),
        _ => None,
    };

    SignalOutcome {
        signal_id: signal.id,
        result,
        exit_price: signal.exit_price,
        r_value: signal.r_value,
        tp_levels_hit,
        mfe,
        mae,
        duration,
    }
}

fn compute_mfe_mae(signal: &Signal, events: &[SignalEvent]) -> (Option<f64>, Option<f64>) {
    let mut best: Option<f64> = None;
    let mut worst: Option<f64> = None;
    for event in events {
        if event.kind != EventKind::PriceUpdate {
            continue;
        }
        let Some(price) = event.price else { continue };
        let r = signal.r_value_at(price);
        best = Some(best.map_or(r, |b: f64| b.max(r)));
        worst = Some(worst.map_or(r, |w: f64| w.min(r)));
    }
    (best, worst)
}

#[derive(Debug, Clone, Default)]
pub struct OutcomeAggregate {
    pub count: usize,
    pub wins: usize,
    pub losses: usize,
    pub partials: usize,
    pub win_rate: f64,
    pub tp_hit_rates: HashMap<u8, f64>,
    pub mean_r: f64,
    pub best_r: f64,
    pub worst_r: f64,
    pub total_r: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_duration_secs: Option<f64>,
}

const PROFIT_FACTOR_DENOM_FLOOR: f64 = 1e-9;

/// Aggregate outcomes into summary statistics. Every division is guarded;
/// an empty slice returns a zeroed-out aggregate rather than dividing by
/// zero.
pub fn aggregate(outcomes: &[SignalOutcome]) -> OutcomeAggregate {
    if outcomes.is_empty() {
        return OutcomeAggregate::default();
    }

    let count = outcomes.len();
    let wins = outcomes
        .iter()
        .filter(|o| o.result == OutcomeResult::Win)
        .count();
    let losses = outcomes
        .iter()
        .filter(|o| o.result == OutcomeResult::Loss)
        .count();
    let partials = outcomes
        .iter()
        .filter(|o| o.result == OutcomeResult::Partial)
        .count();

    let win_rate = wins as f64 / count as f64;

    let mut tp_counts: HashMap<u8, usize> = HashMap::new();
    for o in outcomes {
        for tp in &o.tp_levels_hit {
            *tp_counts.entry(*tp).or_insert(0) += 1;
        }
    }
    let tp_hit_rates = tp_counts
        .into_iter()
        .map(|(tp, n)| (tp, n as f64 / count as f64))
        .collect();

    let r_values: Vec<f64> = outcomes.iter().filter_map(|o| o.r_value).collect();
    let total_r: f64 = r_values.iter().sum();
    let mean_r = if r_values.is_empty() {
        0.0
    } else {
        total_r / r_values.len() as f64
    };
    let best_r = r_values.iter().cloned().fold(f64::MIN, f64::max);
    let worst_r = r_values.iter().cloned().fold(f64::MAX, f64::min);
    let best_r = if best_r == f64::MIN { 0.0 } else { best_r };
    let worst_r = if worst_r == f64::MAX { 0.0 } else { worst_r };

    let positive_sum: f64 = r_values.iter().filter(|&&r| r > 0.0).sum();
    let negative_sum: f64 = r_values.iter().filter(|&&r| r < 0.0).sum::<f64>().abs();
    let profit_factor = positive_sum / negative_sum.max(PROFIT_FACTOR_DENOM_FLOOR);

    let durations: Vec<f64> = outcomes
        .iter()
        .filter_map(|o| o.duration)
        .map(|d| d.num_seconds() as f64)
        .collect();
    let avg_duration_secs = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    };

    OutcomeAggregate {
        count,
        wins,
        losses,
        partials,
        win_rate,
        tp_hit_rates,
        mean_r,
        best_r,
        worst_r,
        total_r,
        profit_factor,
        expectancy: mean_r,
        avg_duration_secs,
    }
}

/// Group outcomes by provider and aggregate each group independently.
pub fn aggregate_by_provider(
    outcomes_with_provider: &[(Uuid, SignalOutcome)],
) -> HashMap<Uuid, OutcomeAggregate> {
    let mut grouped: HashMap<Uuid, Vec<SignalOutcome>> = HashMap::new();
    for (provider_id, outcome) in outcomes_with_provider {
        grouped
            .entry(*provider_id)
            .or_default()
            .push(outcome.clone());
    }
    grouped
        .into_iter()
        .map(|(provider_id, outs)| (provider_id, aggregate(&outs)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Signal;
    use crate::types::{AssetClass, DetectionSource, Direction};
    use chrono::Utc;
    use serde_json::json;

    fn signal() -> Signal {
        Signal::new(
            Uuid::new_v4(),
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

    #[test]
    fn sl_hit_with_no_tp_is_loss() {
        let mut s = signal();
        s.status = SignalStatus::Active;
        s.close(SignalStatus::SlHit, 95.0, "SL_HIT", Utc::now()).unwrap();
        let outcome = resolve(&s, &[]);
        assert_eq!(outcome.result, OutcomeResult::Loss);
    }

    #[test]
    fn tp3_is_win() {
        let mut s = signal();
        s.status = SignalStatus::Tp3Hit;
        let outcome = resolve(&s, &[]);
        assert_eq!(outcome.result, OutcomeResult::Win);
    }

    #[test]
    fn empty_aggregate_is_zeroed() {
        let agg = aggregate(&[]);
        assert_eq!(agg.count, 0);
        assert_eq!(agg.win_rate, 0.0);
        assert_eq!(agg.profit_factor, 0.0);
    }

    #[test]
    fn aggregate_matches_single_outcome() {
        let mut s = signal();
        s.status = SignalStatus::Active;
        s.close(SignalStatus::SlHit, 95.0, "SL_HIT", Utc::now()).unwrap();
        let outcome = resolve(&s, &[]);
        let agg = aggregate(std::slice::from_ref(&outcome));
        assert_eq!(agg.count, 1);
        assert_eq!(agg.total_r, outcome.r_value.unwrap());
    }

    #[test]
    fn mfe_mae_from_price_updates() {
        let mut s = signal();
        s.status = SignalStatus::Active;
        let events = vec![
            SignalEvent::new(s.id, EventKind::PriceUpdate, Some(108.0), DetectionSource::Polling, Utc::now(), json!({})),
            SignalEvent::new(s.id, EventKind::PriceUpdate, Some(97.0), DetectionSource::Polling, Utc::now(), json!({})),
        ];
        let outcome = resolve(&s, &events);
        assert_eq!(outcome.mfe, Some(1.6));
        assert_eq!(outcome.mae, Some(-0.6));
    }
}
