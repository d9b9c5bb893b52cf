// Pure transition table over (current status, incoming event). Never
// raises — an illegal or no-op edge is a returned `Transition` with
// `did_transition = false`, for the caller to log and drop.

use crate::types::{EventKind, SignalStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub new_status: SignalStatus,
    pub did_transition: bool,
    pub reason: String,
    pub is_terminal: bool,
}

fn target_status(event: EventKind) -> SignalStatus {
    match event {
        EventKind::EntryHit => SignalStatus::Active,
        EventKind::Tp1Hit => SignalStatus::Tp1Hit,
        EventKind::Tp2Hit => SignalStatus::Tp2Hit,
        EventKind::Tp3Hit => SignalStatus::Tp3Hit,
        EventKind::SlHit => SignalStatus::SlHit,
        EventKind::ManualClose | EventKind::Expired => SignalStatus::Closed,
        EventKind::ValidationFailed => SignalStatus::Invalid,
        // Audit-only events never target a status; callers must not feed
        // them into `apply`.
        EventKind::EntryRegistered | EventKind::PriceUpdate => SignalStatus::Invalid,
    }
}

fn is_legal_edge(from: SignalStatus, to: SignalStatus) -> bool {
    use SignalStatus::*;
    if from.is_terminal() {
        return false;
    }
    matches!(
        (from, to),
        (Pending, Active)
            | (Pending, Invalid)
            | (Pending, Closed)
            | (Active, Tp1Hit)
            | (Active, SlHit)
            | (Active, Closed)
            | (Tp1Hit, Tp2Hit)
            | (Tp1Hit, SlHit)
            | (Tp1Hit, Closed)
            | (Tp2Hit, Tp3Hit)
            | (Tp2Hit, SlHit)
            | (Tp2Hit, Closed)
            | (Tp3Hit, Closed)
    )
}

/// Apply `event` to a signal currently in `current`. Idempotent: feeding
/// the same event twice in a row when already in the target state returns
/// `did_transition = false` with no error. Illegal edges (e.g. ACTIVE ->
/// TP3_HIT directly) likewise return `did_transition = false`, never an
/// `Err`.
pub fn apply(current: SignalStatus, event: EventKind) -> Transition {
    if matches!(event, EventKind::EntryRegistered | EventKind::PriceUpdate) {
        return Transition {
            new_status: current,
            did_transition: false,
            reason: format!("{event} is audit-only and does not drive the state machine"),
            is_terminal: current.is_terminal(),
        };
    }

    let target = target_status(event);

    if current == target {
        return Transition {
            new_status: current,
            did_transition: false,
            reason: "already in target state".to_string(),
            is_terminal: current.is_terminal(),
        };
    }

    if current.is_terminal() {
        return Transition {
            new_status: current,
            did_transition: false,
            reason: format!("{current} is terminal, refusing {event}"),
            is_terminal: true,
        };
    }

    if !is_legal_edge(current, target) {
        return Transition {
            new_status: current,
            did_transition: false,
            reason: format!("no legal edge from {current} to {target} via {event}"),
            is_terminal: current.is_terminal(),
        };
    }

    Transition {
        new_status: target,
        did_transition: true,
        reason: format!("{current} -> {target} via {event}"),
        is_terminal: target.is_terminal(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SignalStatus::*;

    #[test]
    fn pending_entry_hit_activates() {
        let t = apply(Pending, EventKind::EntryHit);
        assert!(t.did_transition);
        assert_eq!(t.new_status, Active);
        assert!(!t.is_terminal);
    }

    #[test]
    fn active_can_collapse_directly_to_sl() {
        let t = apply(Active, EventKind::SlHit);
        assert!(t.did_transition);
        assert_eq!(t.new_status, SlHit);
        assert!(t.is_terminal);
    }

    #[test]
    fn tp1_to_tp3_direct_is_illegal() {
        let t = apply(Tp1Hit, EventKind::Tp3Hit);
        assert!(!t.did_transition);
        assert_eq!(t.new_status, Tp1Hit);
    }

    #[test]
    fn idempotent_same_event_twice() {
        let first = apply(Pending, EventKind::EntryHit);
        assert!(first.did_transition);
        let second = apply(first.new_status, EventKind::EntryHit);
        assert!(!second.did_transition);
        assert_eq!(second.new_status, Active);
    }

    #[test]
    fn terminal_state_refuses_everything() {
        let t = apply(Closed, EventKind::EntryHit);
        assert!(!t.did_transition);
        assert!(t.is_terminal);
        let t2 = apply(SlHit, EventKind::ManualClose);
        assert!(!t2.did_transition);
    }

    #[test]
    fn tp3_can_only_close() {
        let t = apply(Tp3Hit, EventKind::ManualClose);
        assert!(t.did_transition);
        assert_eq!(t.new_status, Closed);
        let blocked = apply(Tp3Hit, EventKind::SlHit);
        assert!(!blocked.did_transition);
    }
}
