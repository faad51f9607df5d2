//! Room registry: creates, indexes and tears down rooms.

use std::collections::HashMap;

use rand::Rng;
use rand::distr::Alphanumeric;
use tidelink_protocol::{Command, MAX_STRING_LEN};
use tidelink_transport::ConnectionId;

use crate::{Room, RoomBatch, RoomConfig, RoomError, RoomId};

/// Attempts at drawing an unused random id before giving up.
const MAX_ID_ATTEMPTS: usize = 64;

/// Ordered list of rooms with O(1) lookup by id.
///
/// Invariants:
/// - `index[id] == i` iff `rooms[i].id() == id`
/// - `member_rooms[conn] == id` iff `conn` is in that room's member set
pub struct RoomRegistry {
    config: RoomConfig,
    rooms: Vec<Room>,
    index: HashMap<RoomId, usize>,
    member_rooms: HashMap<ConnectionId, RoomId>,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: Vec::new(),
            index: HashMap::new(),
            member_rooms: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Registers an empty room with the configured capacity.
    ///
    /// With `Some(id)` the room gets that id; with `None` a random
    /// alphanumeric id of `generated_id_len` characters is drawn.
    ///
    /// # Errors
    /// - [`RoomError::LimitReached`] when `max_rooms` rooms exist
    /// - [`RoomError::InvalidId`] / [`RoomError::AlreadyExists`] for a bad explicit id
    /// - [`RoomError::IdsExhausted`] if no unused random id turns up
    pub fn create_room(&mut self, id: Option<&str>) -> Result<RoomId, RoomError> {
        if self.rooms.len() >= self.config.max_rooms {
            return Err(RoomError::LimitReached(self.config.max_rooms));
        }
        let id = match id {
            Some(id) => {
                let id = RoomId::new(id)?;
                if self.index.contains_key(&id) {
                    return Err(RoomError::AlreadyExists(id));
                }
                id
            }
            None => self.generate_id()?,
        };

        self.index.insert(id.clone(), self.rooms.len());
        self.rooms.push(Room::new(id.clone(), self.config.capacity));
        tracing::info!(room_id = %id, rooms = self.rooms.len(), "room created");
        Ok(id)
    }

    fn generate_id(&self) -> Result<RoomId, RoomError> {
        let len = self.config.generated_id_len.clamp(1, MAX_STRING_LEN);
        let mut rng = rand::rng();
        for _ in 0..MAX_ID_ATTEMPTS {
            let candidate: String = (&mut rng)
                .sample_iter(Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            let id = RoomId::new(candidate)?;
            if !self.index.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(RoomError::IdsExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Index of the room with `id`.
    pub fn find(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&Room> {
        self.find(id).map(|i| &self.rooms[i])
    }

    pub fn room_at(&self, index: usize) -> Option<&Room> {
        self.rooms.get(index)
    }

    /// The room `conn` is a member of.
    pub fn room_of(&self, conn: ConnectionId) -> Option<&RoomId> {
        self.member_rooms.get(&conn)
    }

    /// Appends `conn` to the member set of room `id`.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] for an unknown id
    /// - [`RoomError::AlreadyMember`] if `conn` is in any room
    /// - [`RoomError::Full`] if the room is at capacity
    pub fn join(&mut self, id: &str, conn: ConnectionId) -> Result<&RoomId, RoomError> {
        let index = self
            .find(id)
            .ok_or_else(|| RoomError::NotFound(id.to_string()))?;
        if let Some(current) = self.member_rooms.get(&conn) {
            return Err(RoomError::AlreadyMember(conn, current.clone()));
        }

        let room = &mut self.rooms[index];
        room.add_member(conn)?;
        self.member_rooms.insert(conn, room.id().clone());
        tracing::info!(
            room_id = %room.id(),
            %conn,
            members = room.member_count(),
            "member joined"
        );
        Ok(room.id())
    }

    /// Removes `conn` from whichever room holds it.
    ///
    /// Returns the room id, or `None` if `conn` was not a member.
    pub fn remove_member(&mut self, conn: ConnectionId) -> Option<RoomId> {
        let id = self.member_rooms.remove(&conn)?;
        if let Some(index) = self.find(id.as_str()) {
            let room = &mut self.rooms[index];
            room.remove_member(conn);
            tracing::info!(
                room_id = %id,
                %conn,
                members = room.member_count(),
                "member left"
            );
        }
        Some(id)
    }

    /// Unregisters room `id` and returns it with its members still listed.
    ///
    /// The last room is swapped into the freed index and reindexed.
    pub fn remove_room(&mut self, id: &str) -> Result<Room, RoomError> {
        let index = self
            .index
            .remove(id)
            .ok_or_else(|| RoomError::NotFound(id.to_string()))?;
        let room = self.rooms.swap_remove(index);
        if let Some(moved) = self.rooms.get(index) {
            self.index.insert(moved.id().clone(), index);
        }
        for conn in room.members() {
            self.member_rooms.remove(conn);
        }
        tracing::info!(room_id = %room.id(), members = room.member_count(), "room removed");
        Ok(room)
    }

    /// Unregisters every room, releasing their member sets.
    ///
    /// Returns the connections that were members.
    pub fn clear(&mut self) -> Vec<ConnectionId> {
        self.index.clear();
        self.member_rooms.clear();
        self.rooms
            .drain(..)
            .flat_map(|mut room| room.release_members())
            .collect()
    }

    /// Appends a command to the batch of the room `sender` belongs to.
    ///
    /// Returns `false` if `sender` is not a member of any room.
    pub fn push_command(&mut self, sender: ConnectionId, command: Command) -> bool {
        let Some(index) = self
            .member_rooms
            .get(&sender)
            .and_then(|id| self.index.get(id).copied())
        else {
            return false;
        };
        self.rooms[index].batch_mut().push(sender, command);
        true
    }

    /// Empties every room's batch.
    pub fn clear_batches(&mut self) {
        for room in &mut self.rooms {
            room.batch_mut().clear();
        }
    }

    /// One batch per room, aligned with room indices.
    pub fn batches(&self) -> impl Iterator<Item = &RoomBatch> {
        self.rooms.iter().map(Room::batch)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Total members across all rooms.
    pub fn member_count(&self) -> usize {
        self.member_rooms.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}
