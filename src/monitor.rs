// The monitor loop: every cycle, fetch due signals, group by symbol,
// batch-fetch prices, detect hits, advance the state machine, and
// reschedule. Mirrors `exit::monitor::run_exit_monitor`'s interval-loop
// shape (fetch open items, evaluate outside any lock, write back, bump
// the state version).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::app_state::AppState;
use crate::model::SignalEvent;
use crate::persistence::SignalFilter;
use crate::scheduler;
use crate::state_machine;
use crate::types::{DetectionSource, Direction, EventKind, SignalStatus};

/// Hit detector: SL is always checked before TP on a simultaneous hit,
/// per the conservative precedence rule — this intentionally does not
/// match the candle-open distance comparison a historical replay tool
/// might use.
pub fn detect_hit(status: SignalStatus, direction: Direction, signal_sl: f64, signal_tp: Option<f64>, price: f64) -> Option<EventKind> {
    let Some(tp) = signal_tp else { return None };
    match (status, direction) {
        (SignalStatus::Pending, Direction::Long) if price <= tp => Some(EventKind::EntryHit),
        (SignalStatus::Pending, Direction::Short) if price >= tp => Some(EventKind::EntryHit),
        (SignalStatus::Active | SignalStatus::Tp1Hit | SignalStatus::Tp2Hit, Direction::Long) => {
            if price <= signal_sl {
                Some(EventKind::SlHit)
            } else if price >= tp {
                Some(tp_event_for(status))
            } else {
                None
            }
        }
        (SignalStatus::Active | SignalStatus::Tp1Hit | SignalStatus::Tp2Hit, Direction::Short) => {
            if price >= signal_sl {
                Some(EventKind::SlHit)
            } else if price <= tp {
                Some(tp_event_for(status))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn tp_event_for(status: SignalStatus) -> EventKind {
    match status {
        SignalStatus::Active => EventKind::Tp1Hit,
        SignalStatus::Tp1Hit => EventKind::Tp2Hit,
        SignalStatus::Tp2Hit => EventKind::Tp3Hit,
        _ => unreachable!("tp_event_for called on a non-open status"),
    }
}

/// Pick the entry/next-TP level relevant to the hit check for the
/// signal's current status, per the §4.7 table: PENDING checks entry,
/// ACTIVE checks TP1, TP1_HIT checks TP2, TP2_HIT checks TP3.
fn level_for_status(status: SignalStatus, entry: f64, tp1: f64, tp2: Option<f64>, tp3: Option<f64>) -> Option<f64> {
    match status {
        SignalStatus::Pending => Some(entry),
        SignalStatus::Active => Some(tp1),
        SignalStatus::Tp1Hit => tp2,
        SignalStatus::Tp2Hit => tp3,
        _ => None,
    }
}

/// Long-lived monitor task. Ticks every `config.monitor_cycle_secs`.
/// `shard` optionally restricts this task to symbols whose hash modulo
/// `shard.1` equals `shard.0`, so the loop can be horizontally sharded
/// across processes.
pub async fn run(state: Arc<AppState>, shard: Option<(u32, u32)>) {
    let cycle_secs = state.config.read().monitor_cycle_secs;
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(cycle_secs));
    loop {
        interval.tick().await;
        if let Err(e) = run_cycle(&state, shard).await {
            error!(error = %e, "monitor cycle failed");
        }
    }
}

async fn run_cycle(state: &Arc<AppState>, shard: Option<(u32, u32)>) -> anyhow::Result<()> {
    let batch_limit = state.config.read().monitor_batch_limit;
    let due = state
        .store
        .select_signals(SignalFilter {
            due_before: Some(Utc::now()),
            limit: Some(batch_limit),
            ..Default::default()
        })
        .await?;

    let due: Vec<_> = due
        .into_iter()
        .filter(|s| !s.status.is_terminal())
        .filter(|s| match shard {
            Some((index, total)) if total > 0 => symbol_shard(&s.symbol, total) == index,
            _ => true,
        })
        .collect();

    if due.is_empty() {
        debug!("no signals due for polling this cycle");
        return Ok(());
    }

    let mut by_symbol: HashMap<String, Vec<String>> = HashMap::new();
    for signal in &due {
        by_symbol
            .entry(signal.symbol.clone())
            .or_default()
            .push(signal.id.to_string());
    }
    let symbols: Vec<String> = by_symbol.keys().cloned().collect();

    let quotes = state.price_adapter.fetch_batch(&symbols).await;

    for signal in due {
        let Some(quote) = quotes.get(&signal.symbol) else {
            warn!(symbol = %signal.symbol, "no price quote this cycle, signal retains prior schedule");
            continue;
        };

        if let Err(e) = process_signal_tick(state, signal, quote.price).await {
            error!(error = %e, "failed to process signal tick");
        }
    }

    Ok(())
}

fn symbol_shard(symbol: &str, total: u32) -> u32 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    symbol.hash(&mut hasher);
    (hasher.finish() % total as u64) as u32
}

async fn process_signal_tick(
    state: &Arc<AppState>,
    mut signal: crate::model::Signal,
    price: f64,
) -> anyhow::Result<()> {
    signal.last_price = Some(price);
    signal.last_price_at = Some(Utc::now());

    let price_event = SignalEvent::new(
        signal.id,
        EventKind::PriceUpdate,
        Some(price),
        DetectionSource::Polling,
        Utc::now(),
        serde_json::json!({}),
    );
    state.store.insert_event(price_event).await?;

    let level = level_for_status(signal.status, signal.entry, signal.tp1, signal.tp2, signal.tp3);
    let hit = detect_hit(signal.status, signal.direction, signal.sl, level, price);

    if let Some(event_kind) = hit {
        process_hit(state, &mut signal, event_kind, price).await?;
    }

    let config = state.config.read().clone();
    let schedule = scheduler::next_poll(&signal, price, &config, Utc::now());
    signal.next_poll_at = Some(schedule.next_poll_at);

    state.store.update_signal(signal).await?;
    Ok(())
}

/// Run the transition, and on success write the audit event, update
/// terminal bookkeeping, and schedule outbound notifications.
pub async fn process_hit(
    state: &Arc<AppState>,
    signal: &mut crate::model::Signal,
    event_kind: EventKind,
    price: f64,
) -> anyhow::Result<()> {
    let transition = state_machine::apply(signal.status, event_kind);
    if !transition.did_transition {
        debug!(signal_id = %signal.id, reason = %transition.reason, "state machine refused transition, dropping event");
        return Ok(());
    }

    let now = Utc::now();
    signal.status = transition.new_status;
    if event_kind == EventKind::EntryHit {
        signal.activation_timestamp = Some(now);
    }
    // TP3_HIT is not in the formal terminal set (it can still collapse to
    // CLOSED), but it is a win outcome the moment it lands, so exit
    // bookkeeping is recorded here too; a later MANUAL_CLOSE/EXPIRED
    // overwrites it with the actual close price.
    if transition.is_terminal || signal.status == SignalStatus::Tp3Hit {
        let reason = event_kind.to_string();
        signal.closure_timestamp = Some(now);
        signal.exit_price = Some(price);
        signal.close_reason = Some(reason);
        signal.r_value = Some(signal.r_value_at(price));
    }

    let event = SignalEvent::new(
        signal.id,
        event_kind,
        Some(price),
        DetectionSource::Polling,
        now,
        serde_json::json!({}),
    );
    state.store.insert_event(event.clone()).await?;
    state.increment_version();

    if let Some(provider) = state.store.get_provider(signal.provider_id).await? {
        let router = state.notification_router.clone();
        let signal_clone = signal.clone();
        let event_clone = event.clone();
        tokio::spawn(async move {
            router.route(&event_clone, &signal_clone, &provider).await;
        });
    } else {
        info!(signal_id = %signal.id, "no provider found, skipping notification routing");
    }

    Ok(())
}
