//! Room registry for Tidelink.
//!
//! A room is an id, a capacity and an ordered set of member connections.
//! The [`RoomRegistry`] keeps rooms in a list plus an id → index map, and
//! tracks which room each connection belongs to (at most one).
//!
//! # Key types
//!
//! - [`RoomRegistry`]: create/find/join/remove, per-tick command batches
//! - [`Room`] / [`RoomId`]: a registered room and its validated id
//! - [`RoomBatch`] / [`CommandProcessor`]: the handoff to gameplay code
//! - [`RoomConfig`]: capacity, room limit, generated id length

mod batch;
mod config;
mod error;
mod registry;
mod room;

pub use batch::{BatchedCommand, CommandProcessor, RoomBatch};
pub use config::RoomConfig;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{Room, RoomId};
