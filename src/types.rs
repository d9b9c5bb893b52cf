// =============================================================================
// Shared small enums used across the canonical model
// =============================================================================

use serde::{Deserialize, Serialize};

/// Coarse instrument classification, used to pick risk ceilings and
/// precision rules in the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetClass {
    Futures,
    Forex,
    Crypto,
    Stocks,
    Other,
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Futures => write!(f, "FUTURES"),
            Self::Forex => write!(f, "FOREX"),
            Self::Crypto => write!(f, "CRYPTO"),
            Self::Stocks => write!(f, "STOCKS"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Lifecycle status of a signal. Terminal states are `SlHit`, `Closed`,
/// and `Invalid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Pending,
    Active,
    Tp1Hit,
    Tp2Hit,
    Tp3Hit,
    SlHit,
    Closed,
    Invalid,
}

impl SignalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::SlHit | Self::Closed | Self::Invalid)
    }
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Tp1Hit => "TP1_HIT",
            Self::Tp2Hit => "TP2_HIT",
            Self::Tp3Hit => "TP3_HIT",
            Self::SlHit => "SL_HIT",
            Self::Closed => "CLOSED",
            Self::Invalid => "INVALID",
        };
        write!(f, "{s}")
    }
}

/// Events that drive (or merely annotate) the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    EntryHit,
    Tp1Hit,
    Tp2Hit,
    Tp3Hit,
    SlHit,
    ManualClose,
    Expired,
    ValidationFailed,
    /// Audit-only event emitted at registration time. Does not drive the
    /// state machine.
    EntryRegistered,
    /// Audit-only price tick, recorded so the outcome resolver can derive
    /// MFE/MAE without replaying the monitor loop.
    PriceUpdate,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EntryHit => "ENTRY_HIT",
            Self::Tp1Hit => "TP1_HIT",
            Self::Tp2Hit => "TP2_HIT",
            Self::Tp3Hit => "TP3_HIT",
            Self::SlHit => "SL_HIT",
            Self::ManualClose => "MANUAL_CLOSE",
            Self::Expired => "EXPIRED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::EntryRegistered => "ENTRY_REGISTERED",
            Self::PriceUpdate => "PRICE_UPDATE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetectionSource {
    TradingView,
    PineScript,
    Polling,
    Manual,
    Historical,
}

impl std::fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::TradingView => "TRADINGVIEW",
            Self::PineScript => "PINESCRIPT",
            Self::Polling => "POLLING",
            Self::Manual => "MANUAL",
            Self::Historical => "HISTORICAL",
        };
        write!(f, "{s}")
    }
}

/// Proximity of the current price to the nearest TP/SL level, used by the
/// adaptive scheduler to pick a poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProximityZone {
    Close,
    Mid,
    Far,
}

impl std::fmt::Display for ProximityZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Close => write!(f, "CLOSE"),
            Self::Mid => write!(f, "MID"),
            Self::Far => write!(f, "FAR"),
        }
    }
}

/// Terminal classification of how a signal's life ended (or its current
/// in-flight state), produced by the outcome resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutcomeResult {
    Win,
    Loss,
    Partial,
    Closed,
    Open,
}

impl std::fmt::Display for OutcomeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
        }
    }
}
