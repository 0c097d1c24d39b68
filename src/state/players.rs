//! Identity registry: stable client ids mapped to their latest connection.

use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use uuid::Uuid;

/// A client known to the server.
///
/// Records are updated in place on reconnect and never dropped on disconnect,
/// so room membership survives a dropped socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Client-chosen stable identifier.
    pub user_id: String,
    /// Display name from the latest identification.
    pub username: String,
    /// Room the player belongs to, as member or spectator.
    pub room_id: Option<String>,
    /// Socket currently serving the player.
    pub connection: Option<Uuid>,
    /// Milliseconds since the epoch when the last socket closed.
    pub disconnected_at: Option<i64>,
}

impl Player {
    /// Whether a socket currently serves the player.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Every player seen since startup, keyed by user id.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: DashMap<String, Player>,
}

impl PlayerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the player on first contact or attach a new socket to the existing record.
    pub fn connect(&self, user_id: &str, username: &str, connection: Uuid) -> Player {
        let mut entry = self
            .players
            .entry(user_id.to_string())
            .or_insert_with(|| Player {
                user_id: user_id.to_string(),
                username: username.to_string(),
                room_id: None,
                connection: None,
                disconnected_at: None,
            });
        entry.username = username.to_string();
        entry.connection = Some(connection);
        entry.disconnected_at = None;
        entry.clone()
    }

    /// Retire `connection` if it is still the player's current socket.
    pub fn disconnect(&self, user_id: &str, connection: Uuid) -> bool {
        match self.players.get_mut(user_id) {
            Some(mut player) if player.connection == Some(connection) => {
                player.connection = None;
                player.disconnected_at = Some(now_millis());
                true
            }
            _ => false,
        }
    }

    /// Display name of a known player.
    pub fn username(&self, user_id: &str) -> Option<String> {
        self.players
            .get(user_id)
            .map(|player| player.username.clone())
    }

    /// Room the player currently belongs to.
    pub fn room_of(&self, user_id: &str) -> Option<String> {
        self.players
            .get(user_id)
            .and_then(|player| player.room_id.clone())
    }

    /// Point the player at `room_id`, or at no room.
    pub fn set_room(&self, user_id: &str, room_id: Option<String>) {
        if let Some(mut player) = self.players.get_mut(user_id) {
            player.room_id = room_id;
        }
    }

    /// Clear the room association only if it still points at `room_id`.
    pub fn clear_room(&self, user_id: &str, room_id: &str) {
        if let Some(mut player) = self.players.get_mut(user_id) {
            if player.room_id.as_deref() == Some(room_id) {
                player.room_id = None;
            }
        }
    }

    /// Whether the player has a live socket.
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.players
            .get(user_id)
            .is_some_and(|player| player.is_connected())
    }

    /// Disconnected with a recorded timestamp; such members are dropped when a room returns to its lobby.
    pub fn is_stale(&self, user_id: &str) -> bool {
        self.players
            .get(user_id)
            .is_none_or(|player| player.disconnected_at.is_some_and(|at| at > 0))
    }

    /// Players with a live socket.
    pub fn connected_count(&self) -> usize {
        self.players
            .iter()
            .filter(|player| player.is_connected())
            .count()
    }
}
