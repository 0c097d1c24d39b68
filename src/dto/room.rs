use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::game::GameKind;

/// Public summary of a room, used by listings and join acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    /// Six-character join code.
    pub room_id: String,
    /// Game hosted by the room.
    pub game: GameKind,
    /// Display name of the host, empty once everyone has left.
    pub host: String,
    /// Display names of the members in seat order.
    pub members: Vec<String>,
    /// Number of spectators watching the running game.
    pub spectators: usize,
    /// Hidden from listings when set.
    pub is_private: bool,
    /// Whether a game is running.
    pub in_game: bool,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// Query parameters of the room listing route.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoomListQuery {
    /// Only list rooms hosting this game (`mafia` or `spyfall`).
    pub game: Option<String>,
}
