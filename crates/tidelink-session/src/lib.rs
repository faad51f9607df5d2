//! Client and server sessions for Tidelink.
//!
//! Both sessions are driven by the caller, once per frame, and never
//! block on the network:
//!
//! - [`ClientSession`]: one connection; connect as a [`ConnectTicket`],
//!   snapshots into a ring buffer, commands out on the reliable pipeline
//! - [`ServerSession`]: listener, unclaimed pool with timeout eviction,
//!   the JoinRoom/CreateRoom control channel, per-room command batches
//!
//! # How it fits in the stack
//!
//! ```text
//! Gameplay (above)   ← reads snapshots / consumes RoomBatch via CommandProcessor
//!     ↕
//! Session (this crate)
//!     ↕
//! Room registry · ring buffer · protocol records · transport driver (below)
//! ```

mod client;
mod config;
mod error;
mod server;
mod ticket;
mod unclaimed;

pub use client::{ClientSession, ClientState};
pub use config::{ClientConfig, ServerConfig};
pub use error::SessionError;
pub use server::{ServerSession, ServerState};
pub use ticket::{ConnectTicket, RoomTicket, Ticket};
pub use unclaimed::UnclaimedConnection;
