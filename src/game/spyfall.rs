//! Hidden-role guessing game: one outsider, one shared secret, one countdown.

use std::sync::Arc;

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use tracing::info;

use crate::{
    config::Topics,
    dto::{
        settings::{GameSettings, SpyfallSettings},
        ws::{GameSnapshot, ServerMessage},
    },
    game::{Game, GameError, GameKind, Seat, TickOutcome},
    state::{clock::Clock, hub::Outbox},
};

const MIN_PLAYERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Round {
    outsider: usize,
    secret: String,
}

/// State of one guessing-game room.
#[derive(Debug)]
pub struct SpyfallGame {
    room_id: String,
    settings: SpyfallSettings,
    topics: Arc<Topics>,
    rng: StdRng,
    seats: Vec<Seat>,
    round: Option<Round>,
    clock: Clock,
}

impl SpyfallGame {
    /// Idle game for `room_id`, seeded from the OS.
    pub fn new(room_id: &str, settings: SpyfallSettings, topics: Arc<Topics>) -> Self {
        Self::with_rng(room_id, settings, topics, StdRng::from_os_rng())
    }

    /// Build a game drawing the outsider and the secret from `rng`.
    pub fn with_rng(
        room_id: &str,
        settings: SpyfallSettings,
        topics: Arc<Topics>,
        rng: StdRng,
    ) -> Self {
        Self {
            room_id: room_id.to_string(),
            settings,
            topics,
            rng,
            seats: Vec::new(),
            round: None,
            clock: Clock::default(),
        }
    }

    /// Seat holding the outsider role in the running round.
    pub fn outsider(&self) -> Option<usize> {
        self.round.as_ref().map(|round| round.outsider)
    }

    fn assignment(&self, index: usize, round: &Round) -> ServerMessage {
        let is_outsider = index == round.outsider;
        ServerMessage::SpyfallAssignment {
            index,
            is_outsider,
            topic: self.settings.topic,
            topics: self.topics.list(self.settings.topic).to_vec(),
            secret: (!is_outsider).then(|| round.secret.clone()),
        }
    }
}

impl Game for SpyfallGame {
    fn kind(&self) -> GameKind {
        GameKind::Spyfall
    }

    fn settings(&self) -> GameSettings {
        GameSettings::Spyfall(self.settings.clone())
    }

    fn update_settings(&mut self, settings: GameSettings) -> Result<(), GameError> {
        match settings {
            GameSettings::Spyfall(settings) => {
                self.settings = settings;
                Ok(())
            }
            GameSettings::Mafia(_) => Err(GameError::SettingsMismatch),
        }
    }

    fn begin(&mut self, seats: Vec<Seat>, outbox: &mut Outbox) -> Result<(), GameError> {
        if seats.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers {
                needed: MIN_PLAYERS,
                present: seats.len(),
            });
        }
        let secret = self
            .topics
            .list(self.settings.topic)
            .choose(&mut self.rng)
            .cloned()
            .ok_or(GameError::NoTopics)?;
        let outsider = self.rng.random_range(0..seats.len());

        self.seats = seats;
        let round = Round { outsider, secret };
        for (index, seat) in self.seats.iter().enumerate() {
            outbox.send_to(seat.user_id.as_str(), self.assignment(index, &round));
        }
        self.round = Some(round);
        self.clock.start(self.settings.time * 60);

        info!(
            room_id = %self.room_id,
            members = self.seats.len(),
            minutes = self.settings.time,
            "guessing game started"
        );
        Ok(())
    }

    fn end(&mut self, _outbox: &mut Outbox) {
        self.clock.cancel();
        self.round = None;
        self.seats.clear();
    }

    fn tick(&mut self, outbox: &mut Outbox) -> TickOutcome {
        let Some(tick) = self.clock.tick() else {
            return TickOutcome::Continue;
        };
        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::SpyfallTimeUpdate {
                time_remaining: tick.shown,
            },
        );
        if !tick.expired {
            return TickOutcome::Continue;
        }

        self.clock.cancel();
        if let Some(round) = &self.round {
            let name = self
                .seats
                .get(round.outsider)
                .map(|seat| seat.name.clone())
                .unwrap_or_default();
            outbox.broadcast(
                self.room_id.as_str(),
                ServerMessage::GameEnded {
                    outsider: round.outsider,
                    name,
                    secret: round.secret.clone(),
                },
            );
        }
        info!(room_id = %self.room_id, "guessing game countdown finished");
        TickOutcome::Finished
    }

    fn clock_running(&self) -> bool {
        self.clock.is_running()
    }

    fn snapshot(&self) -> Option<GameSnapshot> {
        self.round.as_ref().map(|_| GameSnapshot::Spyfall {
            time_remaining: self.clock.remaining(),
        })
    }

    fn resync(&self, index: usize, outbox: &mut Outbox) {
        let (Some(seat), Some(round)) = (self.seats.get(index), self.round.as_ref()) else {
            return;
        };
        outbox.send_to(seat.user_id.as_str(), self.assignment(index, round));
    }
}
