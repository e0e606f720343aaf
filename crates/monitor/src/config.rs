//! Timing configuration of the monitor.

use std::time::Duration;

/// Cadences that pace polling and the step reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Period between status requests.
    pub poll_interval: Duration,
    /// Delay between revealing successive forward steps.
    pub reveal_cadence: Duration,
    /// Delay between revealing successive compensation steps.
    pub compensation_cadence: Duration,
    /// Pause after the last reveal of a terminal saga before it counts as
    /// fully animated.
    pub terminal_pause: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            reveal_cadence: Duration::from_millis(250),
            compensation_cadence: Duration::from_millis(300),
            terminal_pause: Duration::from_millis(800),
        }
    }
}
