//! Wire records for Tidelink.
//!
//! - **Records** ([`Command`], [`Snapshot`]): fixed 8-byte sequenced
//!   records that carry gameplay input and state.
//! - **Control channel** ([`ControlRequest`], [`RoomRequestResult`]):
//!   what an unclaimed connection uses to get into a room.
//! - **Codec** ([`WireRecord`]): explicit little-endian layouts.
//!
//! This crate knows nothing about connections or pipelines; it only
//! turns records into payload bytes and back.
//!
//! ```text
//! Transport (frames) → Protocol (records) → Session (rooms, ring buffer)
//! ```

mod codec;
mod control;
mod error;
mod types;

pub use codec::{MAX_STRING_LEN, WireRecord, clamp_string};
pub use control::{ControlRequest, ResultCode, RoomRequestResult};
pub use error::ProtocolError;
pub use types::{Command, Sequenced, Snapshot};
