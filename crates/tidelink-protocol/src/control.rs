//! The unclaimed control channel.
//!
//! Before a connection belongs to a room it may only send control
//! requests, on the reliable pipeline. Each request gets exactly one
//! [`RoomRequestResult`] back.
//!
//! ```text
//! JoinRoom:   0x00 | len (u16le) | room id (utf-8, ≤128 bytes)
//! CreateRoom: 0x01
//! Result:     code (i32le) | len (u16le) | room id or reason (utf-8, ≤128 bytes)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::{Reader, clamp_string, write_string};
use crate::{ProtocolError, WireRecord};

const OP_JOIN_ROOM: u8 = 0;
const OP_CREATE_ROOM: u8 = 1;

/// A request from an unclaimed connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Join the room with this id.
    JoinRoom(String),
    /// Allocate a new, empty room. The reply carries its id.
    CreateRoom,
}

impl WireRecord for ControlRequest {
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        match self {
            Self::JoinRoom(room_id) => {
                buf.push(OP_JOIN_ROOM);
                write_string(buf, room_id)
            }
            Self::CreateRoom => {
                buf.push(OP_CREATE_ROOM);
                Ok(())
            }
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(bytes);
        let request = match reader.read_u8()? {
            OP_JOIN_ROOM => Self::JoinRoom(reader.read_string()?),
            OP_CREATE_ROOM => Self::CreateRoom,
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        reader.finish()?;
        Ok(request)
    }
}

/// Outcome code of a control request. Zero means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    /// The request succeeded.
    Ok,
    /// No room has the requested id.
    RoomNotFound,
    /// The room is at capacity.
    RoomFull,
    /// The request could not be decoded.
    InvalidRequest,
    /// The server cannot host more rooms.
    RoomLimitReached,
    /// A code this build does not know.
    Other(i32),
}

impl ResultCode {
    /// The integer sent on the wire.
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::RoomNotFound => 1,
            Self::RoomFull => 2,
            Self::InvalidRequest => 3,
            Self::RoomLimitReached => 4,
            Self::Other(code) => code,
        }
    }

    /// Maps a wire integer back to a code.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::RoomNotFound,
            2 => Self::RoomFull,
            3 => Self::InvalidRequest,
            4 => Self::RoomLimitReached,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "code {code}"),
            known => write!(f, "{known:?}"),
        }
    }
}

/// Reply to a [`ControlRequest`].
///
/// On success `room_id_or_reason` is the room id; on failure it is a
/// human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRequestResult {
    /// Outcome code.
    pub code: ResultCode,
    /// Room id on success, reason text otherwise.
    pub room_id_or_reason: String,
}

impl RoomRequestResult {
    /// A success reply carrying `room_id`.
    pub fn success(room_id: impl Into<String>) -> Self {
        Self {
            code: ResultCode::Ok,
            room_id_or_reason: room_id.into(),
        }
    }

    /// A failure reply. Reasons longer than the wire limit are truncated.
    pub fn failure(code: ResultCode, reason: &str) -> Self {
        Self {
            code,
            room_id_or_reason: clamp_string(reason).to_string(),
        }
    }

    /// `true` if the code is zero.
    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Ok
    }
}

impl WireRecord for RoomRequestResult {
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        buf.extend_from_slice(&self.code.to_i32().to_le_bytes());
        write_string(buf, &self.room_id_or_reason)
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(bytes);
        let code = ResultCode::from_i32(reader.read_i32()?);
        let room_id_or_reason = reader.read_string()?;
        reader.finish()?;
        Ok(Self {
            code,
            room_id_or_reason,
        })
    }
}
