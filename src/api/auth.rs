// =============================================================================
// Provider resolution — API-key lookup, constant-time compare
// =============================================================================
//
// Resolves which `Provider` an inbound webhook belongs to, per the
// resolution order in the external-interfaces section: X-API-Key header
// match, then body-declared provider name, then the oldest active
// provider, then auto-creation of a default "AutoBridge" provider.
//
// The constant-time comparison itself lives on `Provider::matches_api_key`
// (model/provider.rs); this module is the extractor/lookup glue, in the
// shape of the bearer-token extractor this engine used for its admin API.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::app_state::AppState;
use crate::model::Provider;

#[derive(Debug, Serialize)]
pub struct AuthRejection {
    pub error: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, Json(self)).into_response()
    }
}

/// Resolve the provider for an inbound request. `api_key_header` is the
/// raw `X-API-Key` header value, if present; `body_provider_name` is the
/// `provider` field from the JSON body, if present.
pub async fn resolve_provider(
    state: &Arc<AppState>,
    api_key_header: Option<&str>,
    body_provider_name: Option<&str>,
) -> anyhow::Result<Provider> {
    if let Some(key) = api_key_header {
        for provider in state.store.list_active_providers().await? {
            if provider.matches_api_key(key) {
                return Ok(provider);
            }
        }
    }

    if let Some(name) = body_provider_name {
        if let Some(provider) = state.store.find_provider_by_name(name).await? {
            if provider.is_active {
                return Ok(provider);
            }
        }
    }

    let active = state.store.list_active_providers().await?;
    if let Some(oldest) = active.into_iter().min_by_key(|p| p.created_at) {
        return Ok(oldest);
    }

    info!("no active provider resolved, auto-creating AutoBridge");
    let (provider, _raw_key) = Provider::create("AutoBridge");
    state.store.insert_provider(provider.clone()).await?;
    Ok(provider)
}

/// Byte-for-byte constant-time comparison, reused from
/// `model::provider::constant_time_eq` for anything outside the provider
/// model that needs it (kept here as a thin re-export so call sites don't
/// need to know which module owns the primitive).
pub use crate::model::provider::constant_time_eq;
