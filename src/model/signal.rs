use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{AssetClass, Direction, SignalStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("entry/sl/tp1 must be finite and positive")]
    NonFinitePrice,
    #[error("tp3 present without tp2")]
    Tp3WithoutTp2,
    #[error("cannot mutate terminal signal {0}")]
    TerminalImmutable(Uuid),
}

/// The canonical trade-intent entity tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub direction: Direction,
    pub entry: f64,
    pub sl: f64,
    pub tp1: f64,
    pub tp2: Option<f64>,
    pub tp3: Option<f64>,
    pub risk_distance: f64,
    pub rr_ratio: f64,
    pub status: SignalStatus,
    pub entry_timestamp: DateTime<Utc>,
    pub activation_timestamp: Option<DateTime<Utc>>,
    pub closure_timestamp: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub close_reason: Option<String>,
    pub r_value: Option<f64>,
    pub mfe: Option<f64>,
    pub mae: Option<f64>,
    pub next_poll_at: Option<DateTime<Utc>>,
    pub last_price: Option<f64>,
    pub last_price_at: Option<DateTime<Utc>>,
    pub raw_payload: serde_json::Value,
    pub external_id: Option<String>,
    pub strategy_label: Option<String>,
}

impl Signal {
    /// Build a new PENDING signal and derive `risk_distance`/`rr_ratio`.
    /// Ordering sanity (entry/sl/tp levels in the right sequence for the
    /// signal's direction, and a non-zero risk distance) is a *validation*
    /// concern, not a construction one — it is checked by `validator::validate`
    /// (check #1) so an inverted-ordering signal still constructs, persists
    /// as INVALID, and returns 422, instead of being rejected pre-persistence
    /// as malformed. This constructor only refuses structurally broken input
    /// (non-finite/non-positive prices, tp3 without tp2).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider_id: Uuid,
        symbol: String,
        asset_class: AssetClass,
        direction: Direction,
        entry: f64,
        sl: f64,
        tp1: f64,
        tp2: Option<f64>,
        tp3: Option<f64>,
        entry_timestamp: DateTime<Utc>,
        raw_payload: serde_json::Value,
        external_id: Option<String>,
        strategy_label: Option<String>,
    ) -> Result<Self, SignalError> {
        for p in [entry, sl, tp1] {
            if !p.is_finite() || p <= 0.0 {
                return Err(SignalError::NonFinitePrice);
            }
        }
        if let Some(v) = tp2 {
            if !v.is_finite() || v <= 0.0 {
                return Err(SignalError::NonFinitePrice);
            }
        }
        if let Some(v) = tp3 {
            if !v.is_finite() || v <= 0.0 {
                return Err(SignalError::NonFinitePrice);
            }
        }
        if tp3.is_some() && tp2.is_none() {
            return Err(SignalError::Tp3WithoutTp2);
        }

        let risk_distance = (entry - sl).abs();
        // A zero (or, by construction, never-negative) risk distance makes
        // rr_ratio meaningless; leave it at 0 rather than dividing by zero.
        // `validate`'s ordering check flags entry == sl directly.
        let rr_ratio = if risk_distance > 0.0 {
            (tp1 - entry).abs() / risk_distance
        } else {
            0.0
        };

        Ok(Self {
            id: Uuid::new_v4(),
            provider_id,
            symbol,
            asset_class,
            direction,
            entry,
            sl,
            tp1,
            tp2,
            tp3,
            risk_distance,
            rr_ratio,
            status: SignalStatus::Pending,
            entry_timestamp,
            activation_timestamp: None,
            closure_timestamp: None,
            exit_price: None,
            close_reason: None,
            r_value: None,
            mfe: None,
            mae: None,
            next_poll_at: None,
            last_price: None,
            last_price_at: None,
            raw_payload,
            external_id,
            strategy_label,
        })
    }

    /// `r_value` for a hypothetical exit at `price`, per §3's formula.
    /// LONG: (exit-entry)/risk_distance. SHORT: (entry-exit)/risk_distance.
    pub fn r_value_at(&self, price: f64) -> f64 {
        match self.direction {
            Direction::Long => (price - self.entry) / self.risk_distance,
            Direction::Short => (self.entry - price) / self.risk_distance,
        }
    }

    pub fn tp_levels(&self) -> Vec<f64> {
        [Some(self.tp1), self.tp2, self.tp3].into_iter().flatten().collect()
    }

    /// Apply a terminal close. Refuses if the signal is already terminal.
    pub fn close(
        &mut self,
        status: SignalStatus,
        exit_price: f64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SignalError> {
        if self.status.is_terminal() {
            return Err(SignalError::TerminalImmutable(self.id));
        }
        self.status = status;
        self.closure_timestamp = Some(at);
        self.exit_price = Some(exit_price);
        self.close_reason = Some(reason.to_string());
        self.r_value = Some(self.r_value_at(exit_price));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn long_ordering_accepted() {
        let s = Signal::new(
            Uuid::new_v4(),
            "BTCUSDT".into(),
            AssetClass::Crypto,
            Direction::Long,
            100.0,
            95.0,
            110.0,
            Some(120.0),
            Some(130.0),
            ts(),
            json!({}),
            None,
            None,
        )
        .unwrap();
        assert_eq!(s.risk_distance, 5.0);
        assert_eq!(s.rr_ratio, 2.0);
    }

    #[test]
    fn short_ordering_reversed() {
        let s = Signal::new(
            Uuid::new_v4(),
            "EURUSD".into(),
            AssetClass::Forex,
            Direction::Short,
            100.0,
            105.0,
            90.0,
            None,
            None,
            ts(),
            json!({}),
            None,
            None,
        )
        .unwrap();
        assert_eq!(s.risk_distance, 5.0);
    }

    /// entry == sl constructs (it's a validation concern, not a construction
    /// one — see `validator::zero_risk_distance_is_rejected`), with
    /// risk_distance/rr_ratio left at zero rather than dividing by zero.
    #[test]
    fn entry_equals_sl_constructs_with_zero_risk_distance() {
        let s = Signal::new(
            Uuid::new_v4(),
            "NQ".into(),
            AssetClass::Futures,
            Direction::Long,
            100.0,
            100.0,
            110.0,
            None,
            None,
            ts(),
            json!({}),
            None,
            None,
        )
        .unwrap();
        assert_eq!(s.risk_distance, 0.0);
        assert_eq!(s.rr_ratio, 0.0);
    }

    #[test]
    fn tp3_without_tp2_rejected() {
        let err = Signal::new(
            Uuid::new_v4(),
            "NQ".into(),
            AssetClass::Futures,
            Direction::Long,
            100.0,
            95.0,
            110.0,
            None,
            Some(130.0),
            ts(),
            json!({}),
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, SignalError::Tp3WithoutTp2);
    }

    #[test]
    fn sl_hit_exit_at_sl_gives_r_value_minus_one() {
        let mut s = Signal::new(
            Uuid::new_v4(),
            "BTCUSDT".into(),
            AssetClass::Crypto,
            Direction::Long,
            100.0,
            95.0,
            110.0,
            None,
            None,
            ts(),
            json!({}),
            None,
            None,
        )
        .unwrap();
        s.status = SignalStatus::Active;
        s.close(SignalStatus::SlHit, s.sl, "SL_HIT", ts()).unwrap();
        assert_eq!(s.r_value, Some(-1.0));
    }

    #[test]
    fn terminal_signal_cannot_be_closed_again() {
        let mut s = Signal::new(
            Uuid::new_v4(),
            "BTCUSDT".into(),
            AssetClass::Crypto,
            Direction::Long,
            100.0,
            95.0,
            110.0,
            None,
            None,
            ts(),
            json!({}),
            None,
            None,
        )
        .unwrap();
        s.status = SignalStatus::Active;
        s.close(SignalStatus::SlHit, 95.0, "SL_HIT", ts()).unwrap();
        let err = s.close(SignalStatus::Closed, 100.0, "MANUAL_CLOSE", ts()).unwrap_err();
        assert_eq!(err, SignalError::TerminalImmutable(s.id));
    }
}
