//! HTTP surface for the saga progress monitor.
//!
//! A UI layer drives the monitor through these endpoints: submit and cancel
//! orders, switch instruments, read the progress view and dismiss or reset
//! the tracker. Structured logging (tracing) and Prometheus metrics are
//! wired in alongside.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use monitor::{MonitorHandle, UiEvent};
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::submit))
        .route("/orders/{saga_id}/cancel", post(routes::orders::cancel))
        .route("/progress", get(routes::progress::get))
        .route("/progress/dismiss", post(routes::progress::dismiss))
        .route("/progress/reset", post(routes::progress::reset))
        .route("/selection", put(routes::progress::select))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
}

/// Wraps a running monitor into application state.
pub fn create_state(monitor: MonitorHandle) -> Arc<AppState> {
    Arc::new(AppState { monitor })
}

/// Drains the monitor's UI events into the log until the monitor stops.
pub async fn log_ui_events(mut events: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UiEvent::StepRevealed { saga_id, step } => {
                tracing::debug!(saga_id = %saga_id, step = %step, "step revealed");
            }
            UiEvent::AllStepsAnimated { saga_id, status } => {
                tracing::debug!(saga_id = %saga_id, status = %status, "all steps animated");
            }
            UiEvent::Notified { notification } => {
                tracing::info!(
                    saga_id = %notification.saga_id,
                    success = notification.success,
                    failure_reason = notification.details.failure_reason.as_deref(),
                    "saga finished"
                );
            }
            UiEvent::Banner { banner } => {
                tracing::info!(kind = ?banner.kind, message = %banner.message, "banner shown");
            }
        }
    }
}
