//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::routes::orders::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{OrderConfig, StateTimeouts};
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::InMemoryOrderStore;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn order_config() -> OrderConfig {
    OrderConfig::new(
        StateTimeouts::uniform(Duration::from_secs(3600)),
        Duration::from_secs(24 * 3600),
    )
}

fn setup_with_state() -> (axum::Router, Arc<AppState<InMemoryOrderStore>>) {
    let state = api::create_state(InMemoryOrderStore::new(), order_config());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn setup() -> axum::Router {
    setup_with_state().0
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_order(app: &axum::Router) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/orders",
        Some(json!({
            "restaurant_id": uuid::Uuid::new_v4(),
            "target_date": "2026-10-19"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

fn staff(fee: i64) -> Value {
    json!({
        "orderer": "Olga",
        "fetcher": "Fred",
        "money_collector": "Mona",
        "order_fee": fee
    })
}

fn id_of(order: &Value) -> String {
    order["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(&setup(), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_order() {
    let app = setup();
    let order = create_order(&app).await;

    assert_eq!(order["state"], "New");
    assert_eq!(order["version"], 1);
    assert_eq!(order["target_date"], "2026-10-19");
    assert_eq!(order["state_management"]["next_transition"]["trigger"], "expire");
}

#[tokio::test]
async fn test_create_and_get_order() {
    let app = setup();
    let order = create_order(&app).await;
    let id = id_of(&order);

    let (status, loaded) = send(&app, "GET", &format!("/orders/{id}"), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(loaded["id"], order["id"]);
    assert_eq!(loaded["summary"]["count"], 0);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();
    let fake_id = uuid::Uuid::new_v4();

    let (status, body) = send(&app, "GET", &format!("/orders/{fake_id}"), None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let (status, body) = send(&setup(), "GET", "/orders/not-a-uuid", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn test_duplicate_order_for_same_day_is_a_conflict() {
    let app = setup();
    let order = create_order(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "restaurant_id": order["restaurant_id"],
            "target_date": order["target_date"]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "already_exists");
}

#[tokio::test]
async fn test_list_orders_newest_first() {
    let app = setup();
    let first = create_order(&app).await;
    let second = create_order(&app).await;

    let (status, body) = send(&app, "GET", "/orders", None).await;

    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], second["id"]);
    assert_eq!(listed[1]["id"], first["id"]);
}

#[tokio::test]
async fn test_full_order_flow() {
    let app = setup();
    let id = id_of(&create_order(&app).await);

    let (status, order) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/infos"),
        Some(json!({ "version": 1, "infos": staff(200) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["version"], 2);

    let (status, order) = send(
        &app,
        "POST",
        &format!("/orders/{id}/positions"),
        Some(json!({ "version": 2, "name": "Ann", "meal": "Pho", "price": 1100, "tip": 200 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["state"], "Open");
    let position_id = order["positions"][0]["id"].as_str().unwrap().to_string();

    let (status, result) = send(
        &app,
        "POST",
        &format!("/orders/{id}/transitions"),
        Some(json!({ "version": 3, "trigger": "start_ordering" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["removed"], false);
    assert_eq!(result["order"]["state"], "Locked");

    let (status, order) = send(
        &app,
        "PATCH",
        &format!("/orders/{id}/positions/{position_id}"),
        Some(json!({ "version": 4, "paid": 1500 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["positions"][0]["paid"], 1500);

    let (status, summary) = send(&app, "GET", &format!("/orders/{id}/summary"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["version"], 5);
    assert_eq!(summary["paid"], 1500);
    assert_eq!(summary["change_money"], 200);
    assert_eq!(summary["count_missing"], 0);
    assert_eq!(summary["fee_is_satisfied"], true);
}

#[tokio::test]
async fn test_stale_version_is_a_conflict() {
    let app = setup();
    let id = id_of(&create_order(&app).await);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/orders/{id}/infos"),
        Some(json!({ "version": 1, "infos": staff(0) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{id}/positions"),
        Some(json!({ "version": 1, "name": "Ann", "meal": "Pho", "price": 900 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "version_conflict");
}

#[tokio::test]
async fn test_unmet_guard_is_unprocessable() {
    let app = setup();
    let id = id_of(&create_order(&app).await);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{id}/transitions"),
        Some(json!({ "version": 1, "trigger": "start_ordering" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "guard_violation");
}

#[tokio::test]
async fn test_illegal_transition_is_a_conflict() {
    let app = setup();
    let id = id_of(&create_order(&app).await);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{id}/transitions"),
        Some(json!({ "version": 1, "trigger": "archive" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "illegal_transition");
}

#[tokio::test]
async fn test_invalid_position_is_bad_request() {
    let app = setup();
    let id = id_of(&create_order(&app).await);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{id}/positions"),
        Some(json!({ "version": 1, "name": "Ann", "meal": "Pho", "price": 0 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_remove_position() {
    let app = setup();
    let id = id_of(&create_order(&app).await);
    let (_, order) = send(
        &app,
        "POST",
        &format!("/orders/{id}/positions"),
        Some(json!({ "version": 1, "name": "Ann", "meal": "Pho", "price": 900 })),
    )
    .await;
    let position_id = order["positions"][0]["id"].as_str().unwrap().to_string();

    let (status, order) = send(
        &app,
        "DELETE",
        &format!("/orders/{id}/positions/{position_id}?version=2"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["positions"].as_array().unwrap().len(), 0);
    assert_eq!(order["state"], "Open");
}

#[tokio::test]
async fn test_delete_new_order() {
    let (app, state) = setup_with_state();
    let order = create_order(&app).await;
    let id = id_of(&order);

    let (status, _) = send(&app, "DELETE", &format!("/orders/{id}?version=1"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(state.service.list_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_changes_reach_subscribers() {
    let (app, state) = setup_with_state();
    let mut changes = state.notifier.subscribe();

    let order = create_order(&app).await;

    let change = changes.recv().await.unwrap();
    assert_eq!(change.order_id.to_string(), id_of(&order));
    assert_eq!(change.event.event_type(), "OrderCreated");
}

#[tokio::test]
async fn test_change_stream_is_event_stream() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders/changes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    create_order(&app).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_mutations_total"));
}
