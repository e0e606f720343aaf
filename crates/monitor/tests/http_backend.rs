//! Tests for the reqwest backend against a local axum server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::SagaId;
use domain::{Money, OrderRequest, OrderType, SagaStatus, StepRegistry, steps};
use monitor::{
    BackendError, HttpSagaBackend, MonitorConfig, MonitorService, SagaBackend, UiEvent,
};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct MockBackend {
    received: Arc<Mutex<Vec<Value>>>,
    polls: Arc<Mutex<usize>>,
}

async fn submit_order(State(mock): State<MockBackend>, Json(body): Json<Value>) -> Json<Value> {
    let order_type = body["orderType"].clone();
    mock.received.lock().unwrap().push(body);
    Json(json!({
        "sagaId": "saga-http",
        "status": "STARTED",
        "currentStep": null,
        "completedSteps": null,
        "orderType": order_type,
    }))
}

async fn order_status(State(mock): State<MockBackend>, Path(saga_id): Path<String>) -> Response {
    match saga_id.as_str() {
        "saga-http" => {
            let polls = {
                let mut polls = mock.polls.lock().unwrap();
                *polls += 1;
                *polls
            };
            let body = if polls == 1 {
                json!({
                    "sagaId": "saga-http",
                    "status": "IN_PROGRESS",
                    "currentStep": "VERIFY_TRADING_PERMISSION",
                    "completedSteps": ["CREATE_ORDER"],
                })
            } else {
                json!({
                    "sagaId": "saga-http",
                    "status": "COMPLETED",
                    "completedSteps": StepRegistry::default().forward_ids(),
                    "executionPrice": 150.25,
                })
            };
            Json(body).into_response()
        }
        "garbage" => (StatusCode::OK, "not json").into_response(),
        _ => (StatusCode::NOT_FOUND, "").into_response(),
    }
}

async fn cancel_order(Path(saga_id): Path<String>) -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({ "message": format!("Saga {saga_id} already completed") })),
    )
        .into_response()
}

async fn serve(mock: MockBackend) -> String {
    let app = Router::new()
        .route("/api/orders/submit-order", post(submit_order))
        .route("/api/orders/order-status/{saga_id}", get(order_status))
        .route("/api/orders/cancel-order/{saga_id}", post(cancel_order))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/orders")
}

fn backend(base_url: &str) -> HttpSagaBackend {
    HttpSagaBackend::new(base_url, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_submit_sends_camel_case_order() {
    let mock = MockBackend::default();
    let base_url = serve(mock.clone()).await;
    let request = OrderRequest::limit("user-1", "acc-1", "msft", 4, Money::from_cents(15_025));

    let snapshot = backend(&base_url).submit(&request).await.unwrap();

    assert_eq!(snapshot.saga_id.as_str(), "saga-http");
    assert_eq!(snapshot.status, SagaStatus::Submitted);
    assert!(snapshot.completed_steps.is_empty());
    assert_eq!(snapshot.order_type, Some(OrderType::Limit));

    let received = mock.received.lock().unwrap();
    assert_eq!(received[0]["userId"], "user-1");
    assert_eq!(received[0]["stockSymbol"], "MSFT");
    assert_eq!(received[0]["orderType"], "LIMIT");
    assert_eq!(received[0]["limitPrice"], 150.25);
}

#[tokio::test]
async fn test_status_decodes_progress() {
    let base_url = serve(MockBackend::default()).await;
    let snapshot = backend(&base_url)
        .status(&SagaId::new("saga-http"))
        .await
        .unwrap();

    assert_eq!(snapshot.status, SagaStatus::InProgress);
    assert_eq!(
        snapshot.current_step.as_ref().map(|s| s.as_str()),
        Some(steps::VERIFY_TRADING_PERMISSION)
    );
    assert_eq!(snapshot.completed_steps.len(), 1);
}

#[tokio::test]
async fn test_error_responses_are_classified() {
    let base_url = serve(MockBackend::default()).await;
    let backend = backend(&base_url);

    let err = backend.status(&SagaId::new("missing")).await.unwrap_err();
    assert!(matches!(err, BackendError::Rejected { status: 404, .. }));

    let err = backend.status(&SagaId::new("garbage")).await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));

    match backend.cancel(&SagaId::new("saga-http")).await {
        Err(BackendError::Rejected { status, message }) => {
            assert_eq!(status, 409);
            assert_eq!(message, "Saga saga-http already completed");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = backend(&format!("http://{addr}/api/orders"))
        .status(&SagaId::new("saga-http"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
}

#[tokio::test]
async fn test_monitor_tracks_a_saga_over_http() {
    let base_url = serve(MockBackend::default()).await;
    let config = MonitorConfig {
        poll_interval: Duration::from_millis(20),
        reveal_cadence: Duration::from_millis(2),
        compensation_cadence: Duration::from_millis(2),
        terminal_pause: Duration::from_millis(5),
    };
    let (monitor, mut events) = MonitorService::spawn(
        Arc::new(backend(&base_url)),
        Arc::new(StepRegistry::default()),
        config,
    );

    let handle = monitor
        .submit(OrderRequest::market("user-1", "acc-1", "AAPL", 3))
        .await
        .unwrap();
    assert_eq!(handle.saga_id.as_str(), "saga-http");

    let notification = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(UiEvent::Notified { notification }) => return notification,
                Some(_) => {}
                None => panic!("monitor stopped"),
            }
        }
    })
    .await
    .expect("saga should finish");

    assert!(notification.success);
    assert_eq!(
        notification.details.execution_price,
        Some(Money::from_cents(15_025))
    );
    let view = monitor.view().await.unwrap();
    assert_eq!(view.visible_completed_steps.len(), 14);
}
