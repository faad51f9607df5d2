//! Transport driver for Tidelink.
//!
//! Wraps non-blocking socket I/O behind a tick-polled [`NetworkDriver`]:
//! the caller runs [`NetworkDriver::update`] once per tick and then drains
//! accepted connections and per-connection [`NetworkEvent`]s. Two delivery
//! pipelines exist on every driver, [`Pipeline::ReliableSequenced`] and
//! [`Pipeline::UnreliableSequenced`].
//!
//! Link failures never surface as errors from driver calls; they arrive
//! as `Disconnect` events carrying a [`DisconnectReason`].
//!
//! # Feature Flags
//!
//! - `websocket` (default): the driver and its WebSocket backend via
//!   `tokio-tungstenite`

mod config;
#[cfg(feature = "websocket")]
mod driver;
mod endpoint;
mod error;
mod event;
mod frame;
#[cfg(feature = "websocket")]
mod websocket;

pub use config::{DriverConfig, MIN_TIMER};
#[cfg(feature = "websocket")]
pub use driver::NetworkDriver;
pub use endpoint::{endpoint, parse_endpoint};
pub use error::TransportError;
pub use event::{ConnectionState, DisconnectReason, NetworkEvent, Pipeline};
pub use frame::{MAX_PAYLOAD_SIZE, WIRE_VERSION};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a connection.
///
/// Handles are never reused within a process. Whether a handle is still
/// valid is answered by [`NetworkDriver::connection_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }

    pub(crate) fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}
