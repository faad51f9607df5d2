use crate::ConnectionId;

/// Errors that can occur in the transport layer.
///
/// Link failures never show up here: once a connection exists, every
/// failure is reported as a [`NetworkEvent::Disconnect`](crate::NetworkEvent)
/// carrying a [`DisconnectReason`](crate::DisconnectReason).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint string or host could not be parsed.
    #[error("endpoint parse failed: {0}")]
    AddressParse(String),

    /// The driver was created outside a Tokio runtime.
    #[error("no tokio runtime available to drive socket I/O")]
    NoRuntime,

    /// Binding the listen socket failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// `listen` was called on a driver that is already listening.
    #[error("driver is already listening")]
    AlreadyListening,

    /// Opening the TCP stream for an outgoing connection failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// The WebSocket upgrade did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The handle does not refer to a live connection.
    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    /// The connection's I/O task has already stopped.
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),

    /// The payload does not fit into a single frame.
    #[error("payload of {size} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Largest accepted payload.
        max: usize,
    },

    /// A received frame could not be parsed.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}
