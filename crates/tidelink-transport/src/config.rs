//! Driver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shortest duration accepted for any timer in [`DriverConfig`].
pub const MIN_TIMER: Duration = Duration::from_millis(1);

/// Timing knobs for the transport driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// How long a single connect attempt may take, and the spacing
    /// between attempts.
    pub connect_timeout: Duration,

    /// Attempts before an outgoing connection reports
    /// `MaxConnectionAttempts`.
    pub max_connect_attempts: u32,

    /// Silence after which a connection reports `Timeout`.
    pub disconnect_timeout: Duration,

    /// How often a ping is sent to keep an idle link alive.
    pub heartbeat_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(1000),
            max_connect_attempts: 60,
            disconnect_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_millis(500),
        }
    }
}

impl DriverConfig {
    /// Returns a copy with every timer at least [`MIN_TIMER`] and at
    /// least one connect attempt.
    pub fn validated(&self) -> Self {
        Self {
            connect_timeout: self.connect_timeout.max(MIN_TIMER),
            max_connect_attempts: self.max_connect_attempts.max(1),
            disconnect_timeout: self.disconnect_timeout.max(MIN_TIMER),
            heartbeat_interval: self.heartbeat_interval.max(MIN_TIMER),
        }
    }
}
