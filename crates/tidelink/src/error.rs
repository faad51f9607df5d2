//! Unified error type for Tidelink.

use tidelink_protocol::ProtocolError;
use tidelink_room::RoomError;
use tidelink_session::SessionError;
use tidelink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift any layer's error into this one.
#[derive(Debug, thiserror::Error)]
pub enum TidelinkError {
    /// Socket setup or send failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A record failed to encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client or server session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room operation failed.
    #[error(transparent)]
    Room(#[from] RoomError),
}
