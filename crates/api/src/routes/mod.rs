//! HTTP handlers.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod progress;

use monitor::MonitorHandle;

/// Shared application state accessible from all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub monitor: MonitorHandle,
}
