// =============================================================================
// Aurora Signal Bridge — Main Entry Point
// =============================================================================
//
// Starts the ingress API, the monitor loop, and any configured streaming
// price adapters. The monitor loop and API server run as independent tasks
// sharing one `AppState`.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aurora_bridge::app_state::AppState;
use aurora_bridge::config::BridgeConfig;
use aurora_bridge::persistence::memory::InMemoryStore;
use aurora_bridge::price::adapter::PriceAdapter;
use aurora_bridge::price::rest_adapter::RestPriceAdapter;
use aurora_bridge::price::PriceCache;
use aurora_bridge::{api, monitor, persistence};

const CONFIG_PATH: &str = "bridge_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("aurora signal bridge starting up");

    let config = BridgeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load bridge config, using defaults");
        BridgeConfig::default()
    });

    let price_source_url =
        std::env::var("PRICE_SOURCE_URL").unwrap_or_else(|_| "http://localhost:9000".to_string());
    let price_source_rpm: u32 = std::env::var("PRICE_SOURCE_RPM")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1200);

    let store: Arc<dyn persistence::PersistenceStore> = Arc::new(InMemoryStore::default());
    let price_cache = Arc::new(PriceCache::new(Duration::from_secs(config.price_cache_ttl_secs)));
    let price_adapter: Arc<dyn PriceAdapter> =
        Arc::new(RestPriceAdapter::new(price_source_url, price_source_rpm));

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, store, price_cache, price_adapter);

    let monitor_state = state.clone();
    tokio::spawn(async move {
        monitor::run(monitor_state, None).await;
    });

    let api_state = state.clone();
    let server_handle = tokio::spawn(async move {
        let app = api::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("failed to bind API server");
        info!(addr = %bind_addr, "ingress API listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("all subsystems running, press ctrl+c to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("shutdown signal received — stopping gracefully");
        }
        _ = server_handle => {
            error!("api server task exited unexpectedly");
        }
    }

    if let Err(e) = state.config.read().save(CONFIG_PATH) {
        error!(error = %e, "failed to save bridge config on shutdown");
    }

    info!("aurora signal bridge shut down complete");
    Ok(())
}
