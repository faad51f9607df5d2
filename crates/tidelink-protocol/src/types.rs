//! Sequenced records: client commands and server snapshots.
//!
//! Both are 8 bytes on the wire:
//!
//! ```text
//! +------------------+---------------+
//! | sequence (u32le) | value (u32le) |
//! +------------------+---------------+
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::codec::Reader;
use crate::{ProtocolError, WireRecord};

/// A value tagged with a monotonically increasing sequence number.
pub trait Sequenced {
    /// The record's sequence number.
    fn sequence(&self) -> u32;
}

/// Client input, sent client → server on the reliable pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Command {
    /// Position in the client's command stream.
    pub sequence: u32,
    /// Opaque input value, interpreted by gameplay code.
    pub value: u32,
}

/// Server-authoritative state, sent server → client, one per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server tick or state version this snapshot describes.
    pub sequence: u32,
    /// Opaque state value, interpreted by gameplay code.
    pub value: u32,
}

impl Command {
    /// Size of an encoded command.
    pub const WIRE_SIZE: usize = 8;

    /// Creates a command.
    pub fn new(sequence: u32, value: u32) -> Self {
        Self { sequence, value }
    }
}

impl Snapshot {
    /// Size of an encoded snapshot.
    pub const WIRE_SIZE: usize = 8;

    /// Creates a snapshot.
    pub fn new(sequence: u32, value: u32) -> Self {
        Self { sequence, value }
    }
}

impl Sequenced for Command {
    fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl Sequenced for Snapshot {
    fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}={}", self.sequence, self.value)
    }
}

fn encode_pair(buf: &mut Vec<u8>, sequence: u32, value: u32) {
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(&value.to_le_bytes());
}

fn decode_pair(bytes: &[u8]) -> Result<(u32, u32), ProtocolError> {
    let mut reader = Reader::new(bytes);
    let sequence = reader.read_u32()?;
    let value = reader.read_u32()?;
    reader.finish()?;
    Ok((sequence, value))
}

impl WireRecord for Command {
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        encode_pair(buf, self.sequence, self.value);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (sequence, value) = decode_pair(bytes)?;
        Ok(Self { sequence, value })
    }
}

impl WireRecord for Snapshot {
    fn encode_into(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        encode_pair(buf, self.sequence, self.value);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let (sequence, value) = decode_pair(bytes)?;
        Ok(Self { sequence, value })
    }
}
