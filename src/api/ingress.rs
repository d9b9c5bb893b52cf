// Ingress webhook handlers for the three wire formats: structured JSON,
// free-text alert (`{"body": "<text>"}`), and PineScript-style price-level
// events.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::BridgeError;
use crate::model::{Signal, SignalEvent};
use crate::normalizer::{self, NormalizedSignal};
use crate::state_machine;
use crate::types::{DetectionSource, EventKind};
use crate::validator;

use super::auth::resolve_provider;

#[derive(Debug, Serialize)]
struct ValidationSummary {
    is_valid: bool,
    warnings: Vec<String>,
    confidence_score: i32,
    rr_ratio: f64,
}

#[derive(Debug, Serialize)]
struct IngestAccepted {
    status: &'static str,
    signal_id: Uuid,
    symbol: String,
    direction: String,
    validation: ValidationSummary,
}

#[derive(Debug, Serialize)]
struct IngestRejected {
    message: &'static str,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        match self {
            BridgeError::Malformed(msg) => (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "message": msg }))).into_response(),
            BridgeError::ValidationFailed { errors, warnings } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(IngestRejected {
                    message: "validation failed",
                    errors,
                    warnings,
                }),
            )
                .into_response(),
            BridgeError::NotFound(id) => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "message": format!("not found: {id}") }))).into_response(),
            BridgeError::UpstreamPriceFetch(msg) => (StatusCode::BAD_GATEWAY, Json(serde_json::json!({ "message": msg }))).into_response(),
            BridgeError::Persistence(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "message": err.to_string() }))).into_response(),
        }
    }
}

/// `POST /webhook/tradingview` — accepts either structured JSON or the
/// TaskMagic-style `{"body": "<text>"}` free-text form.
pub async fn ingest_tradingview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, BridgeError> {
    let api_key = headers
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body_provider_name = body.get("provider").and_then(|v| v.as_str()).map(str::to_string);

    let provider = resolve_provider(&state, api_key.as_deref(), body_provider_name.as_deref())
        .await
        .map_err(BridgeError::Persistence)?;

    let is_text_alert = body
        .get("body")
        .and_then(|v| v.as_str())
        .is_some()
        && body.get("symbol").is_none();

    let normalized: NormalizedSignal = if is_text_alert {
        let text = body.get("body").and_then(|v| v.as_str()).unwrap_or_default();
        normalizer::parse_text_alert(text).map_err(|e| BridgeError::Malformed(e.to_string()))?
    } else {
        normalizer::normalize_structured(&body).map_err(|e| BridgeError::Malformed(e.to_string()))?
    };

    let signal = Signal::new(
        provider.id,
        normalized.symbol.clone(),
        normalized.asset_class,
        normalized.direction,
        normalized.entry,
        normalized.sl,
        normalized.tp1,
        normalized.tp2,
        normalized.tp3,
        normalized.timestamp,
        normalized.raw_payload,
        None,
        normalized.strategy_label,
    )
    .map_err(|e| BridgeError::Malformed(e.to_string()))?;

    let config = state.config.read().clone();
    let recent = state
        .store
        .select_signals(crate::persistence::SignalFilter {
            provider_id: Some(provider.id),
            ..Default::default()
        })
        .await
        .map_err(BridgeError::Persistence)?;
    let recent_refs: Vec<&Signal> = recent.iter().collect();
    let validation = validator::validate(&signal, &config, Utc::now(), &recent_refs);

    if !validation.is_valid() {
        let mut invalid_signal = signal;
        invalid_signal.status = crate::types::SignalStatus::Invalid;
        state.store.insert_signal(invalid_signal).await.map_err(BridgeError::Persistence)?;
        return Err(BridgeError::ValidationFailed {
            errors: validation.errors,
            warnings: validation.warnings,
        });
    }

    let signal_id = signal.id;
    let symbol = signal.symbol.clone();
    let direction = signal.direction.to_string();
    let rr_ratio = signal.rr_ratio;

    state.store.insert_signal(signal).await.map_err(BridgeError::Persistence)?;
    let registered_event = SignalEvent::new(
        signal_id,
        EventKind::EntryRegistered,
        None,
        DetectionSource::TradingView,
        Utc::now(),
        serde_json::json!({}),
    );
    state.store.insert_event(registered_event).await.map_err(BridgeError::Persistence)?;

    info!(signal_id = %signal_id, symbol = %symbol, "signal accepted");

    Ok((
        StatusCode::OK,
        Json(IngestAccepted {
            status: "accepted",
            signal_id,
            symbol,
            direction,
            validation: ValidationSummary {
                is_valid: true,
                warnings: validation.warnings,
                confidence_score: validation.confidence_score,
                rr_ratio,
            },
        }),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct PineScriptProcessed {
    status: &'static str,
    signal_id: Uuid,
    event_type: String,
    did_transition: bool,
    new_status: String,
}

/// `POST /webhook/pinescript` — price-level events for an already
/// registered signal (wire format (c)).
pub async fn ingest_pinescript_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<Response, BridgeError> {
    let event_input = normalizer::normalize_price_event(&body)
        .map_err(|e| BridgeError::Malformed(e.to_string()))?;

    let signal_id = Uuid::parse_str(&event_input.signal_id)
        .map_err(|_| BridgeError::Malformed("signal_id is not a valid uuid".to_string()))?;

    let mut signal = state
        .store
        .get_signal(signal_id)
        .await
        .map_err(BridgeError::Persistence)?
        .ok_or_else(|| BridgeError::NotFound(signal_id.to_string()))?;

    let event_kind = match event_input.event_type.to_uppercase().as_str() {
        "ENTRY" | "ENTRY_HIT" => EventKind::EntryHit,
        "TP1" | "TP1_HIT" => EventKind::Tp1Hit,
        "TP2" | "TP2_HIT" => EventKind::Tp2Hit,
        "TP3" | "TP3_HIT" => EventKind::Tp3Hit,
        "SL" | "SL_HIT" => EventKind::SlHit,
        "CLOSE" | "MANUAL_CLOSE" => EventKind::ManualClose,
        other => return Err(BridgeError::Malformed(format!("unknown event_type: {other}"))),
    };

    let transition = state_machine::apply(signal.status, event_kind);
    if transition.did_transition {
        let price = event_input.price.unwrap_or(signal.last_price.unwrap_or(signal.entry));
        crate::monitor::process_hit(&state, &mut signal, event_kind, price)
            .await
            .map_err(BridgeError::Persistence)?;
        state.store.update_signal(signal.clone()).await.map_err(BridgeError::Persistence)?;
    } else {
        warn!(signal_id = %signal_id, reason = %transition.reason, "pinescript event produced no transition");
    }

    Ok((
        StatusCode::OK,
        Json(PineScriptProcessed {
            status: "processed",
            signal_id,
            event_type: event_input.event_type,
            did_transition: transition.did_transition,
            new_status: signal.status.to_string(),
        }),
    )
        .into_response())
}
