//! Connections accepted by the server but not yet in a room.

use std::time::Duration;

use tidelink_transport::ConnectionId;

/// An accepted connection waiting to join a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnclaimedConnection {
    pub connection: ConnectionId,
    /// Server elapsed time when the connection was accepted.
    pub first_seen: Duration,
}

impl UnclaimedConnection {
    /// Time spent unclaimed as of `now`.
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.first_seen)
    }
}

/// The unclaimed pool, in accept order.
#[derive(Debug, Default)]
pub(crate) struct UnclaimedPool {
    entries: Vec<UnclaimedConnection>,
}

impl UnclaimedPool {
    pub(crate) fn insert(&mut self, connection: ConnectionId, first_seen: Duration) {
        self.entries.push(UnclaimedConnection {
            connection,
            first_seen,
        });
    }

    pub(crate) fn remove(&mut self, connection: ConnectionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.connection != connection);
        self.entries.len() != before
    }

    /// Keeps entries for which `keep` returns `true`.
    pub(crate) fn retain(&mut self, keep: impl FnMut(&UnclaimedConnection) -> bool) {
        self.entries.retain(keep);
    }

    pub(crate) fn connections(&self) -> Vec<ConnectionId> {
        self.entries.iter().map(|e| e.connection).collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &UnclaimedConnection> {
        self.entries.iter()
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = UnclaimedConnection> + '_ {
        self.entries.drain(..)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
