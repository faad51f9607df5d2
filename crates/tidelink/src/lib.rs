//! # Tidelink
//!
//! Tick-driven client/server transport for real-time multiplayer games.
//!
//! A client keeps one connection, streams snapshots into a ring buffer
//! and sends commands reliably. A server accepts connections into an
//! unclaimed pool, admits them to rooms over a small control channel,
//! evicts the ones that never join, and hands each room's commands to
//! a gameplay stage once per tick.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tidelink::prelude::*;
//!
//! # async fn demo() -> Result<(), TidelinkError> {
//! let mut client = ClientSession::new(ClientConfig::default())?;
//! let mut ticket = client.connect("127.0.0.1:7777")?;
//! loop {
//!     client.tick();
//!     if let Some(result) = ticket.try_result() {
//!         result?;
//!         break;
//!     }
//!     tokio::time::sleep(std::time::Duration::from_millis(16)).await;
//! }
//! client.send(Command::new(0, 42));
//! # Ok(())
//! # }
//! ```

mod error;
mod host;

pub use error::TidelinkError;
pub use host::{ServerHost, ServerHostBuilder};

pub use tidelink_buffer as buffer;
pub use tidelink_protocol as protocol;
pub use tidelink_room as room;
pub use tidelink_session as session;
pub use tidelink_tick as tick;
pub use tidelink_transport as transport;

/// Everything needed to run a client or a server.
pub mod prelude {
    pub use crate::{ServerHost, ServerHostBuilder, TidelinkError};
    pub use tidelink_buffer::SequenceBuffer;
    pub use tidelink_protocol::{Command, ResultCode, Sequenced, Snapshot};
    pub use tidelink_room::{CommandProcessor, RoomBatch, RoomConfig, RoomId};
    pub use tidelink_session::{
        ClientConfig, ClientSession, ClientState, ConnectTicket, RoomTicket, ServerConfig,
        ServerSession, ServerState, SessionError,
    };
    pub use tidelink_tick::{TickConfig, TickInfo, TickPolicy, TickScheduler};
    pub use tidelink_transport::{ConnectionId, DisconnectReason, DriverConfig, Pipeline};
}
