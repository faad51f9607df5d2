//! A single room: id, capacity and ordered member set.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tidelink_protocol::MAX_STRING_LEN;
use tidelink_transport::ConnectionId;

use crate::{RoomBatch, RoomError};

/// Unique room identifier: 1 to 128 bytes of UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Validates and wraps `id`.
    ///
    /// # Errors
    /// [`RoomError::InvalidId`] if `id` is empty or longer than 128 bytes.
    pub fn new(id: impl Into<String>) -> Result<Self, RoomError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_STRING_LEN {
            return Err(RoomError::InvalidId(id));
        }
        Ok(Self(id))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered room.
///
/// Members keep their join order. The room also carries the commands
/// its members sent during the current tick.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    capacity: usize,
    members: Vec<ConnectionId>,
    batch: RoomBatch,
}

impl Room {
    pub(crate) fn new(id: RoomId, capacity: usize) -> Self {
        Self {
            batch: RoomBatch::new(id.clone()),
            id,
            capacity,
            members: Vec::new(),
        }
    }

    /// The room's id.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Maximum number of members.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Members in join order.
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.members.contains(&conn)
    }

    /// Commands collected for this room during the current tick.
    pub fn batch(&self) -> &RoomBatch {
        &self.batch
    }

    pub(crate) fn batch_mut(&mut self) -> &mut RoomBatch {
        &mut self.batch
    }

    pub(crate) fn add_member(&mut self, conn: ConnectionId) -> Result<(), RoomError> {
        if self.is_full() {
            return Err(RoomError::Full(self.id.clone()));
        }
        self.members.push(conn);
        Ok(())
    }

    pub(crate) fn remove_member(&mut self, conn: ConnectionId) -> bool {
        match self.members.iter().position(|m| *m == conn) {
            Some(pos) => {
                self.members.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Empties the member set, returning the released connections.
    pub(crate) fn release_members(&mut self) -> Vec<ConnectionId> {
        std::mem::take(&mut self.members)
    }
}
