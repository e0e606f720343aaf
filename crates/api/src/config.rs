//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use domain::{RegistryError, StepRegistry};
use monitor::MonitorConfig;
use thiserror::Error;

/// Errors raised while loading start-up configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read step registry {path}: {source}")]
    RegistryFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `BACKEND_URL` saga backend base URL
/// - `REQUEST_TIMEOUT_MS` per-request timeout against the backend
/// - `POLL_INTERVAL_MS`, `REVEAL_CADENCE_MS`, `COMPENSATION_CADENCE_MS`,
///   `TERMINAL_PAUSE_MS` monitor timings
/// - `STEP_REGISTRY_PATH` optional JSON step catalog
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub backend_url: String,
    pub request_timeout: Duration,
    pub monitor: MonitorConfig,
    pub step_registry_path: Option<PathBuf>,
}

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080/orders/api/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = MonitorConfig::default();
        let millis = |name: &str, default: Duration| {
            var(name)
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(default, Duration::from_millis)
        };

        Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            backend_url: var("BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            request_timeout: millis("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT),
            monitor: MonitorConfig {
                poll_interval: millis("POLL_INTERVAL_MS", defaults.poll_interval),
                reveal_cadence: millis("REVEAL_CADENCE_MS", defaults.reveal_cadence),
                compensation_cadence: millis(
                    "COMPENSATION_CADENCE_MS",
                    defaults.compensation_cadence,
                ),
                terminal_pause: millis("TERMINAL_PAUSE_MS", defaults.terminal_pause),
            },
            step_registry_path: var("STEP_REGISTRY_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The step catalog: the file at `STEP_REGISTRY_PATH`, or the built-in one.
    pub fn step_registry(&self) -> Result<StepRegistry, ConfigError> {
        let Some(path) = &self.step_registry_path else {
            return Ok(StepRegistry::default());
        };
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::RegistryFile {
            path: path.clone(),
            source,
        })?;
        Ok(StepRegistry::from_json(&json)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            monitor: MonitorConfig::default(),
            step_registry_path: None,
        }
    }
}
