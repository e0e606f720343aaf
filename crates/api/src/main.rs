//! Saga monitor server entry point.

use std::sync::Arc;

use monitor::{HttpSagaBackend, MonitorService};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let registry = config.step_registry().expect("invalid step registry");
    let backend = HttpSagaBackend::new(&config.backend_url, config.request_timeout)
        .expect("invalid backend configuration");
    tracing::info!(
        backend = %backend.base_url(),
        forward_steps = registry.forward().len(),
        poll_interval = ?config.monitor.poll_interval,
        "starting saga monitor"
    );

    let (monitor, events) =
        MonitorService::spawn(Arc::new(backend), Arc::new(registry), config.monitor);
    let event_log = tokio::spawn(api::log_ui_events(events));

    let app = api::create_app(api::create_state(monitor), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // The router held the last monitor handle; the loop winds down with it.
    let _ = event_log.await;
    tracing::info!("server shut down gracefully");
}
