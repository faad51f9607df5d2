//! Room configuration.

use serde::{Deserialize, Serialize};

/// Settings applied to every room the registry creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Maximum members per room.
    pub capacity: usize,

    /// Maximum number of rooms the registry will hold.
    pub max_rooms: usize,

    /// Length of ids generated for CreateRoom requests.
    pub generated_id_len: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            max_rooms: 1024,
            generated_id_len: 6,
        }
    }
}
