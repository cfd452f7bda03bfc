//! Integration tests for API routes.
//!
//! Uses `tower::ServiceExt` to drive the router without a real HTTP server.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, address};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::sync::mpsc;
use tower::ServiceExt;

use sentinel_api::routes::create_router;
use sentinel_api::state::AppState;
use sentinel_common::mode::RawModeSwitch;
use sentinel_common::types::ClassifiedEvent;
use sentinel_common::watchlist::WatchList;
use sentinel_decoders::tokens::TokenTable;
use sentinel_engine::dedup::DedupStore;
use sentinel_engine::price::PriceOracle;
use sentinel_notifier::queue::NotificationQueue;

const MAIN_APP: Address = address!("33381eC82DD811b1BABa841f1e2410468aeD7047");

// ============================================================
// Helpers
// ============================================================

fn make_state(capacity: usize) -> (AppState, mpsc::Receiver<ClassifiedEvent>) {
    let watch = WatchList::new();
    watch.insert(MAIN_APP, Some("Main App"));
    let (queue, rx) = NotificationQueue::channel(capacity);
    let oracle = PriceOracle::new(Vec::new(), Duration::from_secs(30), TokenTable::new());
    let state = AppState::new(
        Arc::new(watch),
        queue,
        Arc::new(DedupStore::new()),
        Arc::new(oracle),
    );
    (state, rx)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

// ============================================================
// Health
// ============================================================

#[tokio::test]
async fn test_health() {
    let (state, _rx) = make_state(10);
    let response = get(create_router(state), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "sentinel");
}

// ============================================================
// Addresses
// ============================================================

#[tokio::test]
async fn test_list_addresses() {
    let (state, _rx) = make_state(10);
    let response = get(create_router(state), "/api/addresses").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["label"], "Main App");
}

#[tokio::test]
async fn test_get_address_found_and_missing() {
    let (state, _rx) = make_state(10);
    let app = create_router(state);

    let response = get(app.clone(), &format!("/api/addresses/{MAIN_APP}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["label"], "Main App");

    let unknown = "/api/addresses/0x9999999999999999999999999999999999999999";
    let response = get(app.clone(), unknown).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app, "/api/addresses/nope").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_address() {
    let (state, _rx) = make_state(10);
    let watch = state.watch.clone();
    let app = create_router(state);

    let response = post_json(
        app.clone(),
        "/api/addresses",
        serde_json::json!({ "address": "0x9999999999999999999999999999999999999999", "label": "Cold" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["added"], true);
    assert_eq!(json["label"], "Cold");
    assert!(watch.is_watched(&address!("9999999999999999999999999999999999999999")));

    // Existing entries keep their label.
    let response = post_json(
        app,
        "/api/addresses",
        serde_json::json!({ "address": MAIN_APP.to_string(), "label": "Renamed" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["added"], false);
    assert_eq!(json["label"], "Main App");
}

#[tokio::test]
async fn test_add_address_defaults_label() {
    let (state, _rx) = make_state(10);
    let response = post_json(
        create_router(state),
        "/api/addresses",
        serde_json::json!({ "address": "0x8888888888888888888888888888888888888888" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["label"], "Extra");
}

#[tokio::test]
async fn test_add_invalid_address() {
    let (state, _rx) = make_state(10);
    let response = post_json(
        create_router(state),
        "/api/addresses",
        serde_json::json!({ "address": "0x1234" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("invalid address"));
}

// ============================================================
// Pipeline status
// ============================================================

#[tokio::test]
async fn test_pipeline_status() {
    let (state, _rx) = make_state(10);
    let switch = RawModeSwitch::new();
    let state = state.with_native_mode(switch.handle());
    state.dedup.check_and_set(alloy::primitives::B256::repeat_byte(7));
    let app = create_router(state);

    let json = body_json(get(app.clone(), "/api/pipeline").await).await;
    assert_eq!(json["watched_addresses"], 1);
    assert_eq!(json["dedup_records"], 1);
    assert_eq!(json["cached_prices"], 0);
    assert_eq!(json["native_mode"], "typed");

    switch.engage();
    let json = body_json(get(app, "/api/pipeline").await).await;
    assert_eq!(json["native_mode"], "raw");
}

#[tokio::test]
async fn test_pipeline_status_without_scanner() {
    let (state, _rx) = make_state(10);
    let json = body_json(get(create_router(state), "/api/pipeline").await).await;
    assert_eq!(json["native_mode"], "disabled");
}

// ============================================================
// Synthetic alert
// ============================================================

#[tokio::test]
async fn test_module_installed_enqueues_important_event() {
    let (state, mut rx) = make_state(10);
    let response = post_json(
        create_router(state),
        "/api/test/module-installed",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let event = rx.recv().await.unwrap();
    assert!(event.important);
    assert!(event.title.contains("InstallModule"));
}

#[tokio::test]
async fn test_module_installed_queue_full() {
    let (state, _rx) = make_state(1);
    state.queue.push(ClassifiedEvent::new("filler", "", false));

    let response = post_json(
        create_router(state),
        "/api/test/module-installed",
        serde_json::json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
