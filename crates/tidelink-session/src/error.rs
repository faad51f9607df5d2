//! Error types for the session layer.

use tidelink_protocol::{ProtocolError, ResultCode};
use tidelink_room::RoomError;
use tidelink_transport::{DisconnectReason, TransportError};

/// Errors that can occur in client and server sessions.
///
/// Link failures during a tick never come back from `tick()`; they
/// reach the caller through a ticket (`ConnectFailed`, `Disconnected`)
/// or not at all.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The address is not `ip:port`. No network attempt was made.
    #[error("invalid address: {0}")]
    AddressParse(String),

    /// The connection dropped before it was established.
    #[error("connect failed: {0}")]
    ConnectFailed(DisconnectReason),

    /// The connection dropped while a room request was outstanding.
    #[error("disconnected: {0}")]
    Disconnected(DisconnectReason),

    /// The operation is not allowed in the session's current state.
    #[error("invalid session state: {0}")]
    InvalidState(String),

    /// A configuration value is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session was closed before the ticket resolved.
    #[error("session closed before the request completed")]
    Abandoned,

    /// The server refused a room request.
    #[error("room request rejected ({code}): {reason}")]
    RoomRejected {
        /// Non-zero result code from the server.
        code: ResultCode,
        /// Explanation sent by the server.
        reason: String,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),
}
