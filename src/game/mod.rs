//! Game engines hosted by rooms.
//!
//! Engines are synchronous: every operation runs to completion and records its
//! notifications in an [`Outbox`]. The owning room task drives their clocks.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    config::AppConfig,
    dto::{settings::GameSettings, ws::GameSnapshot},
    state::hub::Outbox,
};

/// Rule violations reported by engines.
pub mod error;
/// Social-deduction engine.
pub mod mafia;
/// Guessing-game engine.
pub mod spyfall;

pub use error::GameError;
pub use mafia::MafiaGame;
pub use spyfall::SpyfallGame;

/// Game-type tag of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    /// Social-deduction game with day/night phases.
    Mafia,
    /// Hidden-role guessing game with a single countdown.
    Spyfall,
}

impl GameKind {
    /// Every game a room can host.
    pub const ALL: [GameKind; 2] = [GameKind::Mafia, GameKind::Spyfall];

    /// Lowercase wire name, as used in settings and listing filters.
    pub fn as_str(self) -> &'static str {
        match self {
            GameKind::Mafia => "mafia",
            GameKind::Spyfall => "spyfall",
        }
    }
}

/// Member snapshot handed to a game when it begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    /// Stable id of the seated player.
    pub user_id: String,
    /// Display name captured when the game began.
    pub name: String,
}

/// What the room should do after a clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking.
    Continue,
    /// The game ran to completion and the room should return to its lobby.
    Finished,
}

/// Capability shared by every game a room can host.
pub trait Game {
    fn kind(&self) -> GameKind;

    /// Current settings, as echoed to clients.
    fn settings(&self) -> GameSettings;

    /// Replace the settings while the room is in its lobby.
    fn update_settings(&mut self, settings: GameSettings) -> Result<(), GameError>;

    /// Deal the game to `seats`; seat positions are fixed until [`Game::end`].
    fn begin(&mut self, seats: Vec<Seat>, outbox: &mut Outbox) -> Result<(), GameError>;

    /// Stop every clock and drop per-game state.
    fn end(&mut self, outbox: &mut Outbox);

    /// Advance the active clock by one second.
    fn tick(&mut self, outbox: &mut Outbox) -> TickOutcome;

    /// Whether the room task should keep its one-second ticker armed.
    fn clock_running(&self) -> bool;

    /// Public state, `None` while no game is running.
    fn snapshot(&self) -> Option<GameSnapshot>;

    /// Re-send the private view of seat `index` after a reconnect.
    fn resync(&self, index: usize, outbox: &mut Outbox);

    /// Seat `index` left the room; the seat itself stays in the game.
    ///
    /// Games drop the player from any private channel the seat belongs to.
    fn seat_departed(&self, _index: usize, _outbox: &mut Outbox) {}

    /// Seat `index` came back after [`Game::seat_departed`].
    fn seat_returned(&self, _index: usize, _outbox: &mut Outbox) {}
}

/// Room-type tag carrying the state of the hosted game.
#[derive(Debug)]
pub enum GameVariant {
    /// Social-deduction room.
    Mafia(MafiaGame),
    /// Guessing-game room.
    Spyfall(SpyfallGame),
}

impl GameVariant {
    /// Build an idle game for `settings`.
    pub fn from_settings(room_id: &str, settings: GameSettings, config: &AppConfig) -> Self {
        match settings {
            GameSettings::Mafia(settings) => GameVariant::Mafia(MafiaGame::new(
                room_id,
                settings,
                config.mafia_timings(),
            )),
            GameSettings::Spyfall(settings) => GameVariant::Spyfall(SpyfallGame::new(
                room_id,
                settings,
                Arc::clone(&config.topics),
            )),
        }
    }

    fn as_game(&self) -> &dyn Game {
        match self {
            GameVariant::Mafia(game) => game,
            GameVariant::Spyfall(game) => game,
        }
    }

    fn as_game_mut(&mut self) -> &mut dyn Game {
        match self {
            GameVariant::Mafia(game) => game,
            GameVariant::Spyfall(game) => game,
        }
    }

    /// The social-deduction engine, for actions only it supports.
    pub fn as_mafia_mut(&mut self) -> Option<&mut MafiaGame> {
        match self {
            GameVariant::Mafia(game) => Some(game),
            GameVariant::Spyfall(_) => None,
        }
    }
}

impl Game for GameVariant {
    fn kind(&self) -> GameKind {
        self.as_game().kind()
    }

    fn settings(&self) -> GameSettings {
        self.as_game().settings()
    }

    fn update_settings(&mut self, settings: GameSettings) -> Result<(), GameError> {
        self.as_game_mut().update_settings(settings)
    }

    fn begin(&mut self, seats: Vec<Seat>, outbox: &mut Outbox) -> Result<(), GameError> {
        self.as_game_mut().begin(seats, outbox)
    }

    fn end(&mut self, outbox: &mut Outbox) {
        self.as_game_mut().end(outbox)
    }

    fn tick(&mut self, outbox: &mut Outbox) -> TickOutcome {
        self.as_game_mut().tick(outbox)
    }

    fn clock_running(&self) -> bool {
        self.as_game().clock_running()
    }

    fn snapshot(&self) -> Option<GameSnapshot> {
        self.as_game().snapshot()
    }

    fn resync(&self, index: usize, outbox: &mut Outbox) {
        self.as_game().resync(index, outbox)
    }

    fn seat_departed(&self, index: usize, outbox: &mut Outbox) {
        self.as_game().seat_departed(index, outbox)
    }

    fn seat_returned(&self, index: usize, outbox: &mut Outbox) {
        self.as_game().seat_returned(index, outbox)
    }
}
