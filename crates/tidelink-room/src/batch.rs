//! Per-room command batches and the processing stage that consumes them.
//!
//! Each tick the session appends the commands room members sent, in
//! arrival order. A [`CommandProcessor`] supplied by the caller then
//! interprets them. The network core guarantees delivery and order only.

use tidelink_protocol::Command;
use tidelink_transport::ConnectionId;

use crate::RoomId;

/// A command together with the member that sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchedCommand {
    pub sender: ConnectionId,
    pub command: Command,
}

/// Ordered commands received for one room during one tick.
#[derive(Debug, Clone)]
pub struct RoomBatch {
    room_id: RoomId,
    entries: Vec<BatchedCommand>,
}

impl RoomBatch {
    pub(crate) fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            entries: Vec::new(),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Entries in arrival order.
    pub fn entries(&self) -> &[BatchedCommand] {
        &self.entries
    }

    /// Commands in arrival order, without their senders.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter().map(|e| &e.command)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(&mut self, sender: ConnectionId, command: Command) {
        self.entries.push(BatchedCommand { sender, command });
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The gameplay stage that consumes command batches.
///
/// Called once per room per tick, with rooms in registry order.
pub trait CommandProcessor {
    fn process(&mut self, batch: &RoomBatch);
}

impl<F> CommandProcessor for F
where
    F: FnMut(&RoomBatch),
{
    fn process(&mut self, batch: &RoomBatch) {
        self(batch)
    }
}
