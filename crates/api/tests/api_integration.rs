//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::StepRegistry;
use metrics_exporter_prometheus::PrometheusHandle;
use monitor::{BackendError, InMemorySagaBackend, MonitorConfig, MonitorService};
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

fn setup_with_backend() -> (axum::Router, Arc<InMemorySagaBackend>) {
    let backend = Arc::new(InMemorySagaBackend::new());
    let (monitor, events) = MonitorService::spawn(
        Arc::clone(&backend),
        Arc::new(StepRegistry::default()),
        MonitorConfig::default(),
    );
    tokio::spawn(api::log_ui_events(events));
    let app = api::create_app(api::create_state(monitor), get_metrics_handle());
    (app, backend)
}

fn setup() -> axum::Router {
    setup_with_backend().0
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn market_order(symbol: &str) -> Value {
    json!({
        "userId": "user-1",
        "accountId": "acc-1",
        "stockSymbol": symbol,
        "orderType": "MARKET",
        "quantity": 10,
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["phase"], "IDLE");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;

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
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_submit_order() {
    let (app, backend) = setup_with_backend();
    let (status, json) = send(&app, "POST", "/orders", Some(market_order("aapl"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(json["sagaId"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(json["status"], "SUBMITTED");
    assert_eq!(json["orderType"], "MARKET");
    assert_eq!(backend.submitted()[0].stock_symbol.as_str(), "AAPL");
}

#[tokio::test]
async fn test_invalid_order_is_bad_request() {
    let (app, backend) = setup_with_backend();
    let mut order = market_order("AAPL");
    order["orderType"] = json!("LIMIT");

    let (status, json) = send(&app, "POST", "/orders", Some(order)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid order"));
    assert!(backend.submitted().is_empty());

    let (_, view) = send(&app, "GET", "/progress", None).await;
    assert_eq!(view["banner"]["kind"], "submission");
}

#[tokio::test]
async fn test_second_submit_conflicts() {
    let app = setup();
    send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;
    let (status, json) = send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already active"));
}

#[tokio::test]
async fn test_backend_rejection_is_bad_gateway() {
    let (app, backend) = setup_with_backend();
    backend.set_fail_on_submit(Some(BackendError::Transport(
        "connection refused".to_string(),
    )));

    let (status, json) = send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("connection refused")
    );
}

#[tokio::test]
async fn test_progress_view_of_a_tracked_saga() {
    let app = setup();
    let (_, handle) = send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;

    let (status, view) = send(&app, "GET", "/progress", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "ACTIVE");
    assert_eq!(view["sagaId"], handle["sagaId"]);
    assert_eq!(view["selection"], "AAPL");
    assert_eq!(view["status"], "SUBMITTED");
    assert_eq!(view["stepsToShow"].as_array().unwrap().len(), 14);
    assert_eq!(view["stepsToShow"][0]["displayName"], "Create Order");
    assert_eq!(view["stepsToShow"][0]["state"], "pending");
    assert_eq!(view["visibleCompletedSteps"], json!([]));
    assert_eq!(view["readyToNotify"], false);
}

#[tokio::test]
async fn test_cancel_tracked_saga() {
    let (app, backend) = setup_with_backend();
    let (_, handle) = send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;
    let saga_id = handle["sagaId"].as_str().unwrap();

    let (status, json) = send(&app, "POST", &format!("/orders/{saga_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["outcome"], "REQUESTED");
    assert_eq!(json["status"], "COMPENSATING");

    let (status, json) = send(&app, "POST", &format!("/orders/{saga_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "ALREADY_COMPENSATING");
    assert_eq!(backend.cancel_calls(), 1);

    let (_, view) = send(&app, "GET", "/progress", None).await;
    assert_eq!(view["phase"], "COMPENSATING");
}

#[tokio::test]
async fn test_cancel_without_tracked_saga_is_not_found() {
    let app = setup();
    let (status, _) = send(&app, "POST", "/orders/saga-1/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;
    let (status, json) = send(&app, "POST", "/orders/saga-other/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("saga-other"));
}

#[tokio::test]
async fn test_cancel_rejected_by_backend() {
    let (app, backend) = setup_with_backend();
    backend.set_fail_on_cancel(Some(BackendError::Rejected {
        status: 409,
        message: "Order already executing".to_string(),
    }));
    let (_, handle) = send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;
    let saga_id = handle["sagaId"].as_str().unwrap();

    let (status, _) = send(&app, "POST", &format!("/orders/{saga_id}/cancel"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (_, view) = send(&app, "GET", "/progress", None).await;
    assert_eq!(view["phase"], "ACTIVE");
    assert_eq!(view["banner"]["kind"], "cancellation");
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let app = setup();
    send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;

    let (status, _) = send(&app, "POST", "/progress/reset", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, view) = send(&app, "GET", "/progress", None).await;
    assert_eq!(view["phase"], "IDLE");
    assert_eq!(view["sagaId"], Value::Null);
}

#[tokio::test]
async fn test_dismiss_before_notification_keeps_tracking() {
    let app = setup();
    send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;

    let (status, json) = send(&app, "POST", "/progress/dismiss", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["dismissed"], false);

    let (_, view) = send(&app, "GET", "/progress", None).await;
    assert_eq!(view["phase"], "ACTIVE");
}

#[tokio::test]
async fn test_selecting_another_instrument_abandons_tracking() {
    let app = setup();
    send(&app, "POST", "/orders", Some(market_order("AAPL"))).await;

    let (status, view) = send(&app, "PUT", "/selection", Some(json!({ "symbol": "msft" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["phase"], "IDLE");
    assert_eq!(view["selection"], "MSFT");
}

#[tokio::test]
async fn test_malformed_selection_is_bad_request() {
    let app = setup();
    let (status, json) = send(&app, "PUT", "/selection", Some(json!({ "symbol": "not a ticker" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("Invalid stock symbol"));
}
