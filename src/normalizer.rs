// Turns provider-shaped ingress payloads (structured JSON, free-text
// alerts, price-level events) into the canonical model's inputs.
//
// Detection order and alias tables follow the original bridge's
// normalizer; the "Target:"/"Profit:" fallback in the free-text parser is
// intentionally NOT carried over when a "Take Profit" label is present in
// the same body (see module docs on `parse_text_alert`).

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::types::{AssetClass, Direction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("price must be finite and positive: {0}")]
    InvalidPrice(&'static str),
    #[error("empty symbol")]
    EmptySymbol,
}

/// Intermediate, un-validated representation of a normalized signal —
/// ordering/confidence checks happen later, in `validator.rs` and
/// `Signal::new`.
#[derive(Debug, Clone)]
pub struct NormalizedSignal {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub direction: Direction,
    pub entry: f64,
    pub sl: f64,
    pub tp1: f64,
    pub tp2: Option<f64>,
    pub tp3: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub provider_name: Option<String>,
    pub strategy_label: Option<String>,
    pub raw_payload: Value,
}

/// A normalized PineScript-style price-level event for an already
/// registered signal.
#[derive(Debug, Clone)]
pub struct NormalizedPriceEvent {
    pub signal_id: String,
    pub event_type: String,
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

static FUTURES_SYMBOLS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "NQ", "MNQ", "ES", "MES", "YM", "MYM", "RTY", "M2K", "GC", "MGC", "CL", "MCL", "SI",
        "SIL", "ZB", "ZN", "ZW", "ZC",
    ]
    .into_iter()
    .collect()
});

const CRYPTO_SUFFIXES: [&str; 5] = ["USDT", "USD", "BTC", "ETH", "BUSD"];

static FOREX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{6}$").unwrap());
static CONTRACT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]!$").unwrap());

const ENTRY_ALIASES: [&str; 5] = ["entry", "entry_price", "price", "open", "entry_level"];
const SL_ALIASES: [&str; 5] = ["stop_loss", "stoploss", "stop", "stop_level", "sl_price"];

pub fn normalize_symbol(raw: &str) -> Result<(String, AssetClass), NormalizationError> {
    let trimmed = raw.trim().to_uppercase();
    if trimmed.is_empty() {
        return Err(NormalizationError::EmptySymbol);
    }
    let stripped = CONTRACT_SUFFIX.replace(&trimmed, "").to_string();
    let asset_class = detect_asset_class(&stripped);
    Ok((stripped, asset_class))
}

/// Fixed detection order: known futures roots, then the 6-letter forex
/// pattern (checked before crypto, since pairs like "EURUSD" end in
/// "USD"), then crypto suffixes, else stocks.
fn detect_asset_class(symbol: &str) -> AssetClass {
    if FUTURES_SYMBOLS.contains(symbol) {
        return AssetClass::Futures;
    }
    if FOREX_PATTERN.is_match(symbol) {
        return AssetClass::Forex;
    }
    if CRYPTO_SUFFIXES.iter().any(|suf| symbol.ends_with(suf)) {
        return AssetClass::Crypto;
    }
    AssetClass::Stocks
}

/// Try ISO-8601 (with "Z" or numeric offset), then
/// "YYYY-MM-DD HH:MM:SS", then a decimal Unix-seconds number, falling back
/// to `Utc::now()`.
pub fn parse_timestamp(raw: Option<&Value>) -> DateTime<Utc> {
    let Some(v) = raw else { return Utc::now() };
    match v {
        Value::String(s) => parse_timestamp_str(s).unwrap_or_else(Utc::now),
        Value::Number(n) => n
            .as_f64()
            .and_then(parse_epoch_seconds)
            .unwrap_or_else(Utc::now),
        _ => Utc::now(),
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(epoch) = s.parse::<f64>() {
        return parse_epoch_seconds(epoch);
    }
    None
}

fn parse_epoch_seconds(epoch: f64) -> Option<DateTime<Utc>> {
    if !(0.0..10_000_000_000.0).contains(&epoch) {
        return None;
    }
    DateTime::from_timestamp(epoch as i64, 0)
}

fn get_field_f64(payload: &Value, aliases: &[&str]) -> Option<f64> {
    for alias in aliases {
        if let Some(v) = payload.get(alias) {
            match v {
                Value::Number(n) => return n.as_f64(),
                Value::String(s) => {
                    if let Ok(f) = s.parse::<f64>() {
                        return Some(f);
                    }
                }
                _ => {}
            }
        }
    }
    None
}

fn get_field_str(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Normalize a structured ingress JSON body (wire format (a) in the
/// external-interfaces section).
pub fn normalize_structured(payload: &Value) -> Result<NormalizedSignal, NormalizationError> {
    let raw_symbol =
        get_field_str(payload, "symbol").ok_or(NormalizationError::MissingField("symbol"))?;
    let (symbol, asset_class) = normalize_symbol(&raw_symbol)?;

    let direction_raw = get_field_str(payload, "direction")
        .ok_or(NormalizationError::MissingField("direction"))?
        .to_uppercase();
    let direction = match direction_raw.as_str() {
        "LONG" | "BUY" => Direction::Long,
        "SHORT" | "SELL" => Direction::Short,
        _ => return Err(NormalizationError::MissingField("direction")),
    };

    let entry = get_field_f64(payload, &ENTRY_ALIASES).ok_or(NormalizationError::MissingField("entry"))?;
    let sl = get_field_f64(payload, &SL_ALIASES).ok_or(NormalizationError::MissingField("sl"))?;
    let tp1 = tp_field(payload, 1).ok_or(NormalizationError::MissingField("tp1"))?;
    let tp2 = tp_field(payload, 2);
    let tp3 = tp_field(payload, 3);

    for (name, price) in [("entry", entry), ("sl", sl), ("tp1", tp1)] {
        let _ = name;
        if !price.is_finite() || price <= 0.0 {
            return Err(NormalizationError::InvalidPrice("entry/sl/tp1"));
        }
    }

    let timestamp = parse_timestamp(payload.get("timestamp"));
    let provider_name = get_field_str(payload, "provider");
    let strategy_label = get_field_str(payload, "strategy");

    Ok(NormalizedSignal {
        symbol,
        asset_class,
        direction,
        entry,
        sl,
        tp1,
        tp2,
        tp3,
        timestamp,
        provider_name,
        strategy_label,
        raw_payload: payload.clone(),
    })
}

fn tp_field(payload: &Value, n: u8) -> Option<f64> {
    let aliases = [
        format!("takeprofit{n}"),
        format!("target{n}"),
        format!("t{n}"),
        format!("tp_{n}"),
        format!("tp{n}"),
    ];
    let alias_refs: Vec<&str> = aliases.iter().map(String::as_str).collect();
    get_field_f64(payload, &alias_refs)
}

static SYMBOL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Symbol[:\s]+([A-Za-z0-9!]+)").unwrap());
static ENTRY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Entry[:\s]+([\d.,]+)").unwrap());
static SL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Stop\s*Loss[:\s]+([\d.,]+)").unwrap());
static TP_LABELED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Take\s*Profit\s*(\d)?[:\s]+([\d.,]+)").unwrap());

fn tp_short_pattern(n: u8) -> Regex {
    Regex::new(&format!(r"(?i)TP{n}[:\s]+([\d.,]+)")).unwrap()
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// Parse a free-text alert body. Direction is detected by scanning for
/// SELL/SHORT before BUY/LONG; symbol/entry/SL use fixed labeled regexes;
/// take-profits are collected either from numbered "Take Profit N:" labels
/// or per-index "TPn:" labels.
///
/// Does NOT fall back to a bare "Target:"/"Profit:" label when a
/// "Take Profit" label is present elsewhere in the body — unlike the
/// system this bridge replaces, that fallback is not implemented here.
pub fn parse_text_alert(text: &str) -> Result<NormalizedSignal, NormalizationError> {
    let upper = text.to_uppercase();
    let direction = if upper.contains("SELL") || upper.contains("SHORT") {
        Direction::Short
    } else if upper.contains("BUY") || upper.contains("LONG") {
        Direction::Long
    } else {
        return Err(NormalizationError::MissingField("direction"));
    };

    let raw_symbol = SYMBOL_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('!'))
        .ok_or(NormalizationError::MissingField("symbol"))?;
    let (symbol, asset_class) = normalize_symbol(raw_symbol)?;

    let entry = ENTRY_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_number(m.as_str()))
        .ok_or(NormalizationError::MissingField("entry"))?;
    let sl = SL_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_number(m.as_str()))
        .ok_or(NormalizationError::MissingField("sl"))?;

    let mut tps: [Option<f64>; 3] = [None, None, None];
    let mut found_any_labeled = false;
    for cap in TP_LABELED_PATTERN.captures_iter(text) {
        found_any_labeled = true;
        let idx = cap
            .get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(1);
        if (1..=3).contains(&idx) {
            if let Some(price) = cap.get(2).and_then(|m| parse_number(m.as_str())) {
                tps[idx - 1] = Some(price);
            }
        }
    }
    if !found_any_labeled {
        for (i, slot) in tps.iter_mut().enumerate() {
            let n = (i + 1) as u8;
            if let Some(cap) = tp_short_pattern(n).captures(text) {
                if let Some(price) = cap.get(1).and_then(|m| parse_number(m.as_str())) {
                    *slot = Some(price);
                }
            }
        }
    }

    let tp1 = tps[0].ok_or(NormalizationError::MissingField("tp1"))?;
    let tp2 = tps[1];
    let tp3 = tps[2];

    for price in [entry, sl, tp1] {
        if !price.is_finite() || price <= 0.0 {
            return Err(NormalizationError::InvalidPrice("entry/sl/tp1"));
        }
    }

    Ok(NormalizedSignal {
        symbol,
        asset_class,
        direction,
        entry,
        sl,
        tp1,
        tp2,
        tp3,
        timestamp: Utc::now(),
        provider_name: None,
        strategy_label: None,
        raw_payload: serde_json::json!({ "body": text }),
    })
}

/// Normalize a PineScript-style price-level event (wire format (c)):
/// `{signal_id, event_type, price, timestamp?}`.
pub fn normalize_price_event(payload: &Value) -> Result<NormalizedPriceEvent, NormalizationError> {
    let signal_id =
        get_field_str(payload, "signal_id").ok_or(NormalizationError::MissingField("signal_id"))?;
    let event_type =
        get_field_str(payload, "event_type").ok_or(NormalizationError::MissingField("event_type"))?;
    let price = get_field_f64(payload, &["price"]);
    let timestamp = parse_timestamp(payload.get("timestamp"));
    Ok(NormalizedPriceEvent {
        signal_id,
        event_type,
        price,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eurusd_is_forex_not_crypto() {
        let (symbol, class) = normalize_symbol("eurusd").unwrap();
        assert_eq!(symbol, "EURUSD");
        assert_eq!(class, AssetClass::Forex);
    }

    #[test]
    fn futures_contract_suffix_stripped() {
        let (symbol, class) = normalize_symbol("NQ1!").unwrap();
        assert_eq!(symbol, "NQ");
        assert_eq!(class, AssetClass::Futures);
    }

    #[test]
    fn btcusdt_is_crypto() {
        let (_, class) = normalize_symbol("btcusdt").unwrap();
        assert_eq!(class, AssetClass::Crypto);
    }

    #[test]
    fn aapl_is_stocks() {
        let (_, class) = normalize_symbol("aapl").unwrap();
        assert_eq!(class, AssetClass::Stocks);
    }

    #[test]
    fn structured_payload_with_aliases() {
        let payload = serde_json::json!({
            "symbol": "ESZ4",
            "direction": "LONG",
            "entry_price": 4500.0,
            "stop_loss": 4490.0,
            "tp1": 4520.0,
        });
        let n = normalize_structured(&payload).unwrap();
        assert_eq!(n.entry, 4500.0);
        assert_eq!(n.sl, 4490.0);
        assert_eq!(n.tp1, 4520.0);
    }

    #[test]
    fn text_alert_parses_all_three_tps_numbered_label() {
        let text = "BUY Symbol: BTCUSDT Entry: 50,000 Stop Loss: 49,000 \
                     Take Profit 1: 51,000 Take Profit 2: 52,000 Take Profit 3: 53,000";
        let n = parse_text_alert(text).unwrap();
        assert_eq!(n.tp1, 51000.0);
        assert_eq!(n.tp2, Some(52000.0));
        assert_eq!(n.tp3, Some(53000.0));
    }

    #[test]
    fn text_alert_parses_tpn_short_form() {
        let text = "SELL Symbol: EURUSD Entry: 1.1000 Stop Loss: 1.1050 TP1: 1.0950 TP2: 1.0900";
        let n = parse_text_alert(text).unwrap();
        assert_eq!(n.direction, Direction::Short);
        assert_eq!(n.tp1, 1.0950);
        assert_eq!(n.tp2, Some(1.0900));
    }

    #[test]
    fn text_alert_does_not_use_target_fallback_when_tp_label_present() {
        // Only "Take Profit 1" given; a bare "Target: 999" elsewhere must
        // not be picked up as tp2/tp3.
        let text = "BUY Symbol: AAPL Entry: 150 Stop Loss: 145 Take Profit 1: 160 Target: 999";
        let n = parse_text_alert(text).unwrap();
        assert_eq!(n.tp1, 160.0);
        assert_eq!(n.tp2, None);
    }
}
