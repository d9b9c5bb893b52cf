// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Thin surface over the bridge's signal/provider state plus the ingress
// webhook routes: read-only reporting endpoints, and create-only provider/
// webhook-subscription management. This module exists for dashboards,
// health checks, and onboarding new providers — no signal lifecycle logic
// lives here.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::model::{Provider, WebhookSubscription};
use crate::outcome;
use crate::persistence::SignalFilter;
use crate::types::{EventKind, SignalStatus};

use super::ingress::{ingest_pinescript_event, ingest_tradingview};

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/signals", get(list_signals))
        .route("/api/v1/signals/:id", get(get_signal))
        .route("/api/v1/providers", get(list_providers).post(create_provider))
        .route("/api/v1/providers/:id/webhooks", post(create_subscription))
        .route("/api/v1/reports/outcomes", get(outcomes_report))
        .route("/webhook/tradingview", post(ingest_tradingview))
        .route("/webhook/pinescript", post(ingest_pinescript_event))
        .layer(cors)
        .with_state(state)
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

#[derive(Debug, Deserialize)]
struct ListSignalsQuery {
    status: Option<String>,
    provider_id: Option<Uuid>,
    limit: Option<usize>,
}

async fn list_signals(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListSignalsQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let status = match q.status {
        Some(raw) => Some(parse_status(&raw).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "message": e })),
            )
        })?),
        None => None,
    };

    let signals = state
        .store
        .select_signals(SignalFilter {
            status,
            provider_id: q.provider_id,
            limit: q.limit,
            ..Default::default()
        })
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": e.to_string() })),
            )
        })?;

    Ok(Json(signals))
}

fn parse_status(raw: &str) -> Result<SignalStatus, String> {
    match raw.to_uppercase().as_str() {
        "PENDING" => Ok(SignalStatus::Pending),
        "ACTIVE" => Ok(SignalStatus::Active),
        "TP1_HIT" => Ok(SignalStatus::Tp1Hit),
        "TP2_HIT" => Ok(SignalStatus::Tp2Hit),
        "TP3_HIT" => Ok(SignalStatus::Tp3Hit),
        "SL_HIT" => Ok(SignalStatus::SlHit),
        "CLOSED" => Ok(SignalStatus::Closed),
        "INVALID" => Ok(SignalStatus::Invalid),
        other => Err(format!("unknown status: {other}")),
    }
}

async fn get_signal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let signal = state.store.get_signal(id).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": e.to_string() })),
        )
    })?;

    match signal {
        Some(s) => {
            let events = state.store.events_for_signal(id).await.map_err(|e| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "message": e.to_string() })),
                )
            })?;
            let outcome = outcome::resolve(&s, &events);
            Ok(Json(serde_json::json!({ "signal": s, "events": events, "outcome": outcome })))
        }
        None => Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": format!("signal {id} not found") })),
        )),
    }
}

async fn list_providers(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let providers = state.store.list_active_providers().await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": e.to_string() })),
        )
    })?;
    Ok(Json(providers))
}

#[derive(Debug, Deserialize)]
struct CreateProviderRequest {
    name: String,
}

/// Creates a provider and returns the raw API key exactly once — the store
/// only ever keeps the salted hash, so there is no way to recover it later.
async fn create_provider(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateProviderRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let (provider, raw_api_key) = Provider::create(&body.name);
    state.store.insert_provider(provider.clone()).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": e.to_string() })),
        )
    })?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "provider": provider, "api_key": raw_api_key })),
    ))
}

#[derive(Debug, Deserialize)]
struct CreateSubscriptionRequest {
    url: String,
    event_types: std::collections::HashSet<EventKind>,
}

async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<Uuid>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if state.store.get_provider(provider_id).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": e.to_string() })),
        )
    })?.is_none() {
        return Err((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "message": format!("provider {provider_id} not found") })),
        ));
    }

    let subscription = WebhookSubscription::new(provider_id, body.url, body.event_types);
    state.store.insert_subscription(subscription.clone()).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "message": e.to_string() })),
        )
    })?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "subscription": subscription }))))
}

#[derive(Debug, Deserialize)]
struct OutcomesQuery {
    provider_id: Option<Uuid>,
}

async fn outcomes_report(
    State(state): State<Arc<AppState>>,
    Query(q): Query<OutcomesQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let signals = state
        .store
        .select_signals(SignalFilter {
            provider_id: q.provider_id,
            ..Default::default()
        })
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": e.to_string() })),
            )
        })?;

    let mut outcomes = Vec::with_capacity(signals.len());
    for signal in &signals {
        let events = state.store.events_for_signal(signal.id).await.map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": e.to_string() })),
            )
        })?;
        outcomes.push(outcome::resolve(signal, &events));
    }

    let aggregate = outcome::aggregate(&outcomes);
    Ok(Json(serde_json::json!({ "outcomes": outcomes, "aggregate": aggregate })))
}
