//! Pipelines, events and connection states exposed by the driver.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A configured delivery mode.
///
/// Both pipelines exist as soon as the driver is created. Every frame
/// carries its pipeline so the receiving side can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pipeline {
    /// Delivered in order, without loss, or the connection drops.
    ReliableSequenced,

    /// May be lost. Frames older than the newest delivered one are
    /// discarded on receive, so the consumer never sees a regression.
    UnreliableSequenced,
}

impl Pipeline {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Self::ReliableSequenced => 0,
            Self::UnreliableSequenced => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::ReliableSequenced),
            1 => Some(Self::UnreliableSequenced),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self.to_byte() as usize
    }
}

/// Why a connection was lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Every connect attempt failed.
    MaxConnectionAttempts,
    /// Nothing was heard from the peer within the disconnect timeout.
    Timeout,
    /// The peer closed the connection.
    ClosedByRemote,
    /// Any other failure.
    Default,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxConnectionAttempts => write!(f, "MaxConnectionAttempts"),
            Self::Timeout => write!(f, "Timeout"),
            Self::ClosedByRemote => write!(f, "ClosedByRemote"),
            Self::Default => write!(f, "Default"),
        }
    }
}

/// An event popped from a connection's queue.
///
/// An empty queue is `None` from
/// [`NetworkDriver::pop_event`](crate::NetworkDriver::pop_event).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// An outgoing connection finished its handshake.
    Connect,

    /// A frame arrived on the given pipeline.
    Data {
        /// Pipeline the frame was sent on.
        pipeline: Pipeline,
        /// Frame payload without the header.
        payload: Vec<u8>,
    },

    /// The connection is gone. Its handle is invalid once this is popped.
    Disconnect(DisconnectReason),
}

/// Lifecycle of a connection handle.
///
/// ```text
/// Connecting ──(Connect event)──→ Connected ──(Disconnect popped)──→ Disconnected
/// ```
///
/// Accepted connections start out `Connected`. `Disconnected` doubles as
/// the "invalid handle" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The handle is unknown or its disconnect has been consumed.
    Disconnected,
    /// Connect attempts are still in flight.
    Connecting,
    /// The link is up.
    Connected,
}
