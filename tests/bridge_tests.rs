// End-to-end tests driving ingest -> monitor -> notify through the public
// library surface, against `InMemoryStore` and small local HTTP receivers
// standing in for a subscriber's webhook endpoint.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use tower::ServiceExt;
use uuid::Uuid;

use aurora_bridge::app_state::AppState;
use aurora_bridge::config::BridgeConfig;
use aurora_bridge::model::{Provider, WebhookSubscription};
use aurora_bridge::monitor;
use aurora_bridge::notify::DeliveryWorker;
use aurora_bridge::persistence::memory::InMemoryStore;
use aurora_bridge::persistence::PersistenceStore;
use aurora_bridge::price::adapter::PriceAdapter;
use aurora_bridge::price::cache::{PriceCache, PriceQuote};
use aurora_bridge::types::{AssetClass, Direction, EventKind, SignalStatus};

struct NullPriceAdapter;

#[async_trait::async_trait]
impl PriceAdapter for NullPriceAdapter {
    async fn fetch(&self, _symbol: &str, _hint: Option<AssetClass>) -> Option<PriceQuote> {
        None
    }
    async fn fetch_batch(&self, _symbols: &[String]) -> HashMap<String, PriceQuote> {
        HashMap::new()
    }
}

fn test_state() -> Arc<AppState> {
    let store: Arc<dyn PersistenceStore> = Arc::new(InMemoryStore::default());
    let cache = Arc::new(PriceCache::new(Duration::from_secs(10)));
    let adapter: Arc<dyn PriceAdapter> = Arc::new(NullPriceAdapter);
    AppState::new(BridgeConfig::default(), store, cache, adapter)
}

async fn spawn_recording_receiver() -> (String, Arc<Mutex<Vec<String>>>) {
    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();

    async fn handler(
        State(received): State<Arc<Mutex<Vec<String>>>>,
        body: axum::body::Bytes,
    ) -> impl IntoResponse {
        received.lock().push(String::from_utf8_lossy(&body).to_string());
        StatusCode::OK
    }

    let app = Router::new().route("/hook", post(handler)).with_state(received_clone);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{addr}/hook"), received)
}

async fn spawn_flaky_receiver(fail_count: usize) -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();

    async fn handler(
        State((calls, fail_count)): State<(Arc<AtomicUsize>, usize)>,
    ) -> impl IntoResponse {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        if n < fail_count {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }

    let app = Router::new()
        .route("/hook", post(handler))
        .with_state((calls_clone, fail_count));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{addr}/hook"), calls)
}

async fn read_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// LONG crypto signal, walked through ENTRY -> TP1 -> TP2 -> TP3 via the
/// public `monitor::process_hit`, and observed on a local webhook receiver.
#[tokio::test]
async fn long_crypto_signal_reaches_full_win_and_notifies() {
    let state = test_state();

    let (provider, _raw_key) = Provider::create("TestProvider");
    state.store.insert_provider(provider.clone()).await.unwrap();

    let (hook_url, received) = spawn_recording_receiver().await;
    let subscription = WebhookSubscription::new(
        provider.id,
        hook_url,
        HashSet::from([
            EventKind::EntryHit,
            EventKind::Tp1Hit,
            EventKind::Tp2Hit,
            EventKind::Tp3Hit,
        ]),
    );
    state.store.insert_subscription(subscription).await.unwrap();

    let app = aurora_bridge::api::router(state.clone());
    let body = serde_json::json!({
        "symbol": "BTCUSDT",
        "direction": "LONG",
        "entry": 100.0,
        "sl": 95.0,
        "tp1": 110.0,
        "tp2": 120.0,
        "tp3": 130.0,
    });
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/tradingview")
        .header("content-type", "application/json")
        .header("X-API-Key", "irrelevant-falls-through-to-oldest-active")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_body(response).await;
    let signal_id: Uuid = parsed["signal_id"].as_str().unwrap().parse().unwrap();

    let mut signal = state.store.get_signal(signal_id).await.unwrap().unwrap();
    assert_eq!(signal.status, SignalStatus::Pending);

    monitor::process_hit(&state, &mut signal, EventKind::EntryHit, 100.0).await.unwrap();
    assert_eq!(signal.status, SignalStatus::Active);
    monitor::process_hit(&state, &mut signal, EventKind::Tp1Hit, 110.0).await.unwrap();
    assert_eq!(signal.status, SignalStatus::Tp1Hit);
    monitor::process_hit(&state, &mut signal, EventKind::Tp2Hit, 120.0).await.unwrap();
    assert_eq!(signal.status, SignalStatus::Tp2Hit);
    monitor::process_hit(&state, &mut signal, EventKind::Tp3Hit, 130.0).await.unwrap();
    assert_eq!(signal.status, SignalStatus::Tp3Hit);
    // TP3_HIT is a win outcome but, per the state machine, not a formally
    // terminal status — it can still collapse to CLOSED.
    assert!(!signal.status.is_terminal());
    assert_eq!(signal.r_value, Some(6.0));

    let events = state.store.events_for_signal(signal_id).await.unwrap();
    let outcome = aurora_bridge::outcome::resolve(&signal, &events);
    assert_eq!(outcome.tp_levels_hit, vec![1, 2, 3]);
    assert_eq!(outcome.result, aurora_bridge::types::OutcomeResult::Win);

    // notification delivery is spawned fire-and-forget from process_hit;
    // give the background tasks a moment to land.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let bodies = received.lock().clone();
    assert_eq!(bodies.len(), 4);
    assert!(bodies[0].contains("ENTRY_HIT"));
    assert!(bodies[3].contains("TP3_HIT"));
}

/// A signal whose RR ratio is below the configured minimum is rejected with
/// a 422 and never reaches the store as anything but INVALID.
#[tokio::test]
async fn low_rr_ratio_signal_is_rejected_with_422() {
    let state = test_state();
    let app = aurora_bridge::api::router(state.clone());

    let body = serde_json::json!({
        "symbol": "ESZ4",
        "direction": "LONG",
        "entry": 4500.0,
        "sl": 4480.0,
        "tp1": 4505.0,
    });
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/tradingview")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let parsed = read_body(response).await;
    assert!(parsed["errors"].as_array().unwrap().iter().any(|e| e.as_str().unwrap().contains("rr_ratio")));
}

/// A signal with inverted price ordering (tp1 below entry on a LONG) still
/// constructs and persists as INVALID via the validator, rather than being
/// rejected pre-persistence as malformed.
#[tokio::test]
async fn inverted_ordering_signal_persists_as_invalid_with_422() {
    let state = test_state();
    let app = aurora_bridge::api::router(state.clone());

    let body = serde_json::json!({
        "symbol": "BTCUSDT",
        "direction": "LONG",
        "entry": 100.0,
        "sl": 95.0,
        "tp1": 90.0,
    });
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/tradingview")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let parsed = read_body(response).await;
    assert!(parsed["errors"].as_array().unwrap().iter().any(|e| e.as_str().unwrap().contains("tp1")));

    let signals = state
        .store
        .select_signals(aurora_bridge::persistence::SignalFilter::default())
        .await
        .unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].status, SignalStatus::Invalid);
}

/// A signal that hits TP1 and is later MANUAL_CLOSEd (no SL) resolves as a
/// WIN, not a PARTIAL — reaching any TP with no SL is a win regardless of
/// whether it was later closed out manually.
#[tokio::test]
async fn tp_hit_then_manual_close_resolves_as_win() {
    let state = test_state();

    let (provider, _raw_key) = Provider::create("ManualCloseProvider");
    state.store.insert_provider(provider.clone()).await.unwrap();

    let mut signal = aurora_bridge::model::Signal::new(
        provider.id,
        "BTCUSDT".into(),
        AssetClass::Crypto,
        Direction::Long,
        100.0,
        95.0,
        110.0,
        Some(120.0),
        None,
        chrono::Utc::now(),
        serde_json::json!({}),
        None,
        None,
    )
    .unwrap();
    signal.status = SignalStatus::Active;
    state.store.insert_signal(signal.clone()).await.unwrap();

    monitor::process_hit(&state, &mut signal, EventKind::Tp1Hit, 110.0).await.unwrap();
    assert_eq!(signal.status, SignalStatus::Tp1Hit);

    monitor::process_hit(&state, &mut signal, EventKind::ManualClose, 115.0).await.unwrap();
    assert_eq!(signal.status, SignalStatus::Closed);

    let events = state.store.events_for_signal(signal.id).await.unwrap();
    let outcome = aurora_bridge::outcome::resolve(&signal, &events);
    assert_eq!(outcome.result, aurora_bridge::types::OutcomeResult::Win);
}

/// SHORT forex alert delivered as free text, including an emoji a human
/// trader would paste in, parses correctly and is accepted.
#[tokio::test]
async fn short_forex_text_alert_with_emoji_is_accepted() {
    let state = test_state();
    let app = aurora_bridge::api::router(state.clone());

    let text = "🔻 SELL Symbol: EURUSD Entry: 1.1000 Stop Loss: 1.1050 \
                Take Profit 1: 1.0950 Take Profit 2: 1.0900 🚀";
    let body = serde_json::json!({ "body": text });
    let request = Request::builder()
        .method("POST")
        .uri("/webhook/tradingview")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let parsed = read_body(response).await;
    assert_eq!(parsed["symbol"], "EURUSD");
    assert_eq!(parsed["direction"], "SHORT");
}

/// A flaky receiver that fails twice then succeeds is still delivered to,
/// using the configured retry schedule (shortened here so the test does not
/// actually wait on real minute-scale backoffs).
#[tokio::test]
async fn webhook_delivery_retries_past_transient_failures() {
    let (hook_url, calls) = spawn_flaky_receiver(2).await;
    let provider_id = Uuid::new_v4();
    let subscription = WebhookSubscription::new(provider_id, hook_url, HashSet::new());

    let worker = DeliveryWorker::new(Duration::from_secs(5));
    let mut config = BridgeConfig::default();
    config.webhook_retry_delays_secs = vec![0, 0];

    let outcome = worker
        .deliver_with_retry(&subscription, Uuid::new_v4(), "{}", "dev-secret", &config)
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// A subscription past the circuit-breaker threshold is skipped entirely:
/// no HTTP attempt, no delivery log entry.
#[tokio::test]
async fn circuit_broken_subscription_is_skipped_without_logging() {
    let state = test_state();

    let (provider, _raw_key) = Provider::create("CircuitTestProvider");
    state.store.insert_provider(provider.clone()).await.unwrap();

    let (hook_url, calls) = spawn_flaky_receiver(0).await;
    let mut subscription = WebhookSubscription::new(provider.id, hook_url, HashSet::from([EventKind::SlHit]));
    subscription.consecutive_failures = state.config.read().max_consecutive_failures;
    state.store.insert_subscription(subscription).await.unwrap();

    let mut signal = aurora_bridge::model::Signal::new(
        provider.id,
        "BTCUSDT".into(),
        AssetClass::Crypto,
        Direction::Long,
        100.0,
        95.0,
        110.0,
        None,
        None,
        chrono::Utc::now(),
        serde_json::json!({}),
        None,
        None,
    )
    .unwrap();
    signal.status = SignalStatus::Active;
    state.store.insert_signal(signal.clone()).await.unwrap();

    monitor::process_hit(&state, &mut signal, EventKind::SlHit, 95.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
