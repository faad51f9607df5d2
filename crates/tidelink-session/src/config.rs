//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidelink_room::RoomConfig;
use tidelink_transport::DriverConfig;

/// Configuration for a [`ClientSession`](crate::ClientSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Transport timings.
    pub driver: DriverConfig,

    /// Slots in the snapshot ring buffer. Must be non-zero.
    pub snapshot_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            snapshot_capacity: 32,
        }
    }
}

/// Configuration for a [`ServerSession`](crate::ServerSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Transport timings.
    pub driver: DriverConfig,

    /// How long an accepted connection may stay outside a room before it
    /// is disconnected, measured in accumulated tick time.
    pub unclaimed_timeout: Duration,

    /// Settings for rooms created on this server.
    pub room: RoomConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            driver: DriverConfig::default(),
            unclaimed_timeout: Duration::from_secs(10),
            room: RoomConfig::default(),
        }
    }
}
