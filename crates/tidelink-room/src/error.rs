//! Error types for the room layer.

use tidelink_transport::ConnectionId;

use crate::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The id is empty or longer than the wire limit.
    #[error("invalid room id {0:?}")]
    InvalidId(String),

    /// A room with this id is already registered.
    #[error("room '{0}' already exists")]
    AlreadyExists(RoomId),

    /// No room has this id.
    #[error("room '{0}' not found")]
    NotFound(String),

    /// The room has no free member slot.
    #[error("room '{0}' is full")]
    Full(RoomId),

    /// The registry already holds `max_rooms` rooms.
    #[error("room limit of {0} reached")]
    LimitReached(usize),

    /// Every randomly drawn id was already taken.
    #[error("no unused room id found after {attempts} attempts")]
    IdsExhausted { attempts: usize },

    /// The connection already belongs to a room.
    #[error("{0} is already a member of room '{1}'")]
    AlreadyMember(ConnectionId, RoomId),
}
