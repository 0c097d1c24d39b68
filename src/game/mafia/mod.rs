//! Social-deduction engine: role deal, day/night clock, trials and win detection.
//!
//! Seats are addressed by their position in the member list captured at
//! [`Game::begin`]; the role list is shuffled over those positions so the seat
//! index doubles as the profile index for the whole game.

use rand::{SeedableRng, rngs::StdRng, seq::IndexedRandom, seq::SliceRandom};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::{
        settings::{GameSettings, MafiaSettings},
        ws::{ChatScope, GameSnapshot, ServerMessage},
    },
    game::{Game, GameError, GameKind, Seat, TickOutcome},
    state::{clock::Clock, hub::Outbox},
};

mod night;
mod profile;
mod roles;
mod voting;

#[cfg(test)]
mod tests;

pub use profile::{Investigation, NightOutcome, Profile, SeatReveal, Verdict, VoteTarget};
pub use roles::{
    AliveTable, Faction, Power, Role, build_role_list, quorum, resolve_adversary_count,
};

/// Minimum headcount for any deal.
const MIN_PLAYERS: usize = 3;
/// Consecutive day/night cycles without a death before the stalemate breaker fires.
const STALEMATE_CYCLES: u32 = 3;

/// Fixed durations that are not part of the per-room settings, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MafiaTimings {
    /// Length of the recap closing every day and night.
    pub recap_seconds: i64,
    /// Length of the guilt vote once the defense is over.
    pub guilt_vote_seconds: i64,
    /// Countdown of day 0, shown while players read their roles.
    pub opening_seconds: i64,
}

impl Default for MafiaTimings {
    fn default() -> Self {
        Self {
            recap_seconds: 5,
            guilt_vote_seconds: 15,
            opening_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Playing,
    Over(Faction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Trial {
    accused: usize,
    /// Guilt votes are refused while the accused is defending.
    defending: bool,
}

/// Public recap of a resolved night, held until the next day's recap ends.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRecap {
    night: u32,
    deaths: Vec<SeatReveal>,
    /// Detective seat and what it learned that night.
    reveal: Option<(usize, Investigation)>,
}

/// State of one social-deduction game.
#[derive(Debug)]
pub struct MafiaGame {
    room_id: String,
    adversary_channel: String,
    settings: MafiaSettings,
    timings: MafiaTimings,
    rng: StdRng,
    stage: Stage,
    seats: Vec<Seat>,
    profiles: Vec<Profile>,
    alive: AliveTable,
    phase: u32,
    is_recap: bool,
    main_clock: Clock,
    trial_clock: Clock,
    trial: Option<Trial>,
    num_abstaining: usize,
    cycles_without_death: u32,
    alive_at_last_day: usize,
    pending_recap: Option<PendingRecap>,
}

impl MafiaGame {
    /// Idle game for `room_id`, seeded from the OS.
    pub fn new(room_id: &str, settings: MafiaSettings, timings: MafiaTimings) -> Self {
        Self::with_rng(room_id, settings, timings, StdRng::from_os_rng())
    }

    /// Build a game drawing every random decision from `rng`.
    pub fn with_rng(
        room_id: &str,
        settings: MafiaSettings,
        timings: MafiaTimings,
        rng: StdRng,
    ) -> Self {
        Self {
            room_id: room_id.to_string(),
            adversary_channel: format!("{room_id}:{}", Uuid::new_v4()),
            settings,
            timings,
            rng,
            stage: Stage::Idle,
            seats: Vec::new(),
            profiles: Vec::new(),
            alive: AliveTable::default(),
            phase: 0,
            is_recap: false,
            main_clock: Clock::default(),
            trial_clock: Clock::default(),
            trial: None,
            num_abstaining: 0,
            cycles_without_death: 0,
            alive_at_last_day: 0,
            pending_recap: None,
        }
    }

    /// Phase counter: even phases are days, odd phases nights, phase 0 the opening.
    pub fn phase(&self) -> u32 {
        self.phase
    }

    /// Whether the current phase is in its closing recap.
    pub fn is_recap(&self) -> bool {
        self.is_recap
    }

    pub fn is_day(&self) -> bool {
        self.phase % 2 == 0
    }

    /// Per-seat game state, indexed like the seats.
    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Living seats per role.
    pub fn alive(&self) -> &AliveTable {
        &self.alive
    }

    pub fn num_abstaining(&self) -> usize {
        self.num_abstaining
    }

    /// Seat currently on trial, if any.
    pub fn accused(&self) -> Option<usize> {
        self.trial.map(|trial| trial.accused)
    }

    pub fn is_defending(&self) -> bool {
        self.trial.is_some_and(|trial| trial.defending)
    }

    /// Winning faction once the game is over.
    pub fn winner(&self) -> Option<Faction> {
        match self.stage {
            Stage::Over(faction) => Some(faction),
            _ => None,
        }
    }

    pub fn main_clock(&self) -> &Clock {
        &self.main_clock
    }

    pub fn trial_clock(&self) -> &Clock {
        &self.trial_clock
    }

    /// Private channel shared by the adversaries of this game.
    pub fn adversary_channel(&self) -> &str {
        &self.adversary_channel
    }

    /// Seat `index` if it was dealt an adversary role.
    fn adversary_seat(&self, index: usize) -> Option<&Seat> {
        let profile = self.profiles.get(index)?;
        if !profile.role.is_adversary() {
            return None;
        }
        self.seats.get(index)
    }

    fn night_number(&self) -> u32 {
        self.phase.div_ceil(2)
    }

    fn phase_label(&self) -> String {
        let base = if self.is_day() {
            format!("day {}", self.phase / 2)
        } else {
            format!("night {}", self.night_number())
        };
        if self.is_recap {
            format!("{base} recap")
        } else {
            base
        }
    }

    fn name(&self, index: usize) -> &str {
        self.seats
            .get(index)
            .map(|seat| seat.name.as_str())
            .unwrap_or("unknown")
    }

    fn reveal(&self, index: usize) -> SeatReveal {
        SeatReveal {
            index,
            name: self.name(index).to_string(),
            role: self.profiles[index].role,
        }
    }

    fn ensure_playing(&self) -> Result<(), GameError> {
        match self.stage {
            Stage::Playing => Ok(()),
            _ => Err(GameError::NotRunning),
        }
    }

    /// The acting seat must exist and be alive.
    fn check_actor(&self, me: usize) -> Result<(), GameError> {
        match self.profiles.get(me) {
            None => Err(GameError::UnknownSeat(me)),
            Some(profile) if !profile.is_alive => Err(GameError::NotAlive),
            Some(_) => Ok(()),
        }
    }

    /// The target seat must exist, be alive and, unless `allow_self`, differ from `me`.
    fn check_target(&self, me: usize, target: usize, allow_self: bool) -> Result<(), GameError> {
        match self.profiles.get(target) {
            None => Err(GameError::UnknownSeat(target)),
            Some(profile) if !profile.is_alive => Err(GameError::InvalidTarget(target)),
            Some(_) if target == me && !allow_self => Err(GameError::InvalidTarget(target)),
            Some(_) => Ok(()),
        }
    }

    fn wrong_phase(&self, action: &'static str) -> GameError {
        GameError::WrongPhase {
            action,
            phase: self.phase_label(),
        }
    }

    /// Mark a seat dead and keep the alive table in step.
    fn kill(&mut self, index: usize) -> SeatReveal {
        let profile = &mut self.profiles[index];
        if profile.is_alive {
            profile.is_alive = false;
            self.alive.kill(profile.role);
        }
        self.reveal(index)
    }

    fn check_winner(&self) -> Option<Faction> {
        if self.alive.faction(Faction::Village) == 0 {
            Some(Faction::Mafia)
        } else if self.alive.faction(Faction::Mafia) == 0 {
            Some(Faction::Village)
        } else {
            None
        }
    }

    /// Stop the clocks and tell every seat whether it won.
    fn finish(&mut self, winner: Faction, outbox: &mut Outbox) {
        self.main_clock.cancel();
        self.trial_clock.cancel();
        self.trial = None;
        self.stage = Stage::Over(winner);

        let roles: Vec<SeatReveal> = (0..self.profiles.len()).map(|i| self.reveal(i)).collect();
        for (seat, profile) in self.seats.iter().zip(&self.profiles) {
            outbox.send_to(
                seat.user_id.as_str(),
                ServerMessage::GameOver {
                    winner,
                    won: profile.role.faction() == winner,
                    roles: roles.clone(),
                },
            );
        }
        info!(room_id = %self.room_id, ?winner, phase = self.phase, "game over");
    }

    fn broadcast_time(&self, time_remaining: i64, outbox: &mut Outbox) {
        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::MainTimeUpdate {
                phase: self.phase,
                time_remaining,
                is_recap: self.is_recap,
            },
        );
    }

    /// Called when the main clock runs past zero.
    fn on_main_expired(&mut self, outbox: &mut Outbox) {
        if !self.is_recap {
            self.enter_recap(outbox);
            return;
        }

        if self.is_day() {
            for profile in &mut self.profiles {
                profile.reset_day();
            }
            self.num_abstaining = 0;
            self.publish_recap(outbox);
            if let Some(winner) = self.check_winner() {
                self.finish(winner, outbox);
                return;
            }
            self.phase += 1;
            self.is_recap = false;
            self.main_clock.start(self.settings.night_time_limit);
            debug!(room_id = %self.room_id, phase = self.phase, "night started");
        } else {
            self.resolve_night(outbox);
            if let Some(winner) = self.check_winner() {
                self.finish(winner, outbox);
                return;
            }
            self.phase += 1;
            self.is_recap = false;
            self.start_day(outbox);
        }
    }

    fn start_day(&mut self, outbox: &mut Outbox) {
        if self.settings.day_time_limit < 0 {
            self.main_clock.suspend_at(-1);
            self.broadcast_time(-1, outbox);
        } else {
            self.main_clock.start(self.settings.day_time_limit);
        }
        debug!(room_id = %self.room_id, phase = self.phase, "day started");
    }

    /// End the running day or night and start its recap.
    fn enter_recap(&mut self, outbox: &mut Outbox) {
        self.trial_clock.cancel();
        self.trial = None;
        self.is_recap = true;
        self.main_clock.start(self.timings.recap_seconds);

        if !self.is_day() {
            self.num_abstaining = 0;
        } else if self.phase > 0 {
            self.track_stalemate(outbox);
        }
    }

    fn track_stalemate(&mut self, outbox: &mut Outbox) {
        let alive_now = self.alive.total();
        if alive_now == self.alive_at_last_day {
            self.cycles_without_death += 1;
        } else {
            self.cycles_without_death = 0;
            self.alive_at_last_day = alive_now;
        }

        if self.cycles_without_death < STALEMATE_CYCLES {
            return;
        }

        let living = |role: Option<Role>| -> Vec<usize> {
            self.profiles
                .iter()
                .enumerate()
                .filter(|(_, profile)| profile.is_alive)
                .filter(|(_, profile)| match role {
                    Some(role) => profile.role == role,
                    None => profile.role.faction() == Faction::Village,
                })
                .map(|(index, _)| index)
                .collect()
        };
        let mut candidates = living(Some(Role::Villager));
        if candidates.is_empty() {
            candidates = living(None);
        }

        if let Some(&victim) = candidates.choose(&mut self.rng) {
            let victim = self.kill(victim);
            info!(room_id = %self.room_id, victim = victim.index, "stalemate broken");
            outbox.broadcast(
                self.room_id.as_str(),
                ServerMessage::StalemateBroken { victim },
            );
        }
        self.cycles_without_death = 0;
        self.alive_at_last_day = self.alive.total();
    }

    fn publish_recap(&mut self, outbox: &mut Outbox) {
        let Some(recap) = self.pending_recap.take() else {
            return;
        };

        outbox.broadcast(
            self.room_id.as_str(),
            ServerMessage::NightRecap {
                night: recap.night,
                deaths: recap.deaths,
            },
        );

        if let Some((detective, found)) = recap.reveal {
            if self.profiles[detective].is_alive {
                outbox.send_to(
                    self.seats[detective].user_id.as_str(),
                    ServerMessage::DetectiveReveal {
                        night: recap.night,
                        index: found.index,
                        name: found.name,
                        role: found.role,
                    },
                );
            }
        }
    }

    /// Host action: end the current day without waiting for the clock.
    pub fn force_day_end(&mut self, outbox: &mut Outbox) -> Result<(), GameError> {
        self.ensure_playing()?;
        if !self.is_day() || self.is_recap || self.phase == 0 {
            return Err(self.wrong_phase("ending the day"));
        }
        self.main_clock.cancel();
        self.enter_recap(outbox);
        info!(room_id = %self.room_id, phase = self.phase, "day ended by host");
        Ok(())
    }

    /// Route a chat line according to the phase and the sender's role.
    pub fn chat(&self, me: usize, message: String, outbox: &mut Outbox) -> Result<(), GameError> {
        match self.stage {
            Stage::Idle => return Err(GameError::NotRunning),
            Stage::Over(_) => {
                if me >= self.seats.len() {
                    return Err(GameError::UnknownSeat(me));
                }
                outbox.broadcast(
                    self.room_id.as_str(),
                    ServerMessage::ChatMessage {
                        from: Some(me),
                        name: self.name(me).to_string(),
                        message,
                        scope: ChatScope::Room,
                    },
                );
                return Ok(());
            }
            Stage::Playing => {}
        }

        self.check_actor(me)?;
        let name = self.name(me).to_string();
        let user_id = self.seats[me].user_id.as_str();

        if self.is_day() {
            outbox.broadcast(
                self.room_id.as_str(),
                ServerMessage::ChatMessage {
                    from: Some(me),
                    name,
                    message,
                    scope: ChatScope::Room,
                },
            );
        } else if self.profiles[me].role.is_adversary() {
            outbox.broadcast(
                self.adversary_channel.as_str(),
                ServerMessage::ChatMessage {
                    from: Some(me),
                    name,
                    message,
                    scope: ChatScope::Adversaries,
                },
            );
        } else {
            outbox.send_to(
                user_id,
                ServerMessage::ChatMessage {
                    from: Some(me),
                    name,
                    message,
                    scope: ChatScope::Own,
                },
            );
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.stage = Stage::Idle;
        self.seats.clear();
        self.profiles.clear();
        self.alive.clear();
        self.phase = 0;
        self.is_recap = false;
        self.trial = None;
        self.num_abstaining = 0;
        self.cycles_without_death = 0;
        self.alive_at_last_day = 0;
        self.pending_recap = None;
    }
}

impl Game for MafiaGame {
    fn kind(&self) -> GameKind {
        GameKind::Mafia
    }

    fn settings(&self) -> GameSettings {
        GameSettings::Mafia(self.settings.clone())
    }

    fn update_settings(&mut self, settings: GameSettings) -> Result<(), GameError> {
        match settings {
            GameSettings::Mafia(settings) => {
                self.settings = settings;
                Ok(())
            }
            GameSettings::Spyfall(_) => Err(GameError::SettingsMismatch),
        }
    }

    fn begin(&mut self, seats: Vec<Seat>, outbox: &mut Outbox) -> Result<(), GameError> {
        let members = seats.len();
        let adversaries = resolve_adversary_count(self.settings.num_mafia, members);
        if adversaries == 0 {
            return Err(GameError::NoAdversaries);
        }
        let independents =
            usize::from(self.settings.allow_serial_killer) + usize::from(self.settings.allow_joker);
        let needed = (adversaries + 2 + independents).max(MIN_PLAYERS);
        if members < needed {
            return Err(GameError::NotEnoughPlayers {
                needed,
                present: members,
            });
        }

        let mut roles = build_role_list(
            members,
            adversaries,
            self.settings.allow_serial_killer,
            self.settings.allow_joker,
        );
        roles.shuffle(&mut self.rng);

        self.reset();
        self.alive.fill(&roles);
        self.profiles = roles.iter().copied().map(Profile::new).collect();
        self.seats = seats;
        self.alive_at_last_day = members;

        for (index, (seat, role)) in self.seats.iter().zip(&roles).enumerate() {
            outbox.send_to(
                seat.user_id.as_str(),
                ServerMessage::RoleAssigned { index, role: *role },
            );
            if role.is_adversary() {
                outbox.join(self.adversary_channel.as_str(), seat.user_id.as_str());
            }
        }

        self.stage = Stage::Playing;
        self.phase = 0;
        self.is_recap = true;
        self.trial_clock.cancel();
        self.main_clock.start(self.timings.opening_seconds);

        info!(
            room_id = %self.room_id,
            members,
            adversaries,
            independents,
            "social-deduction game started"
        );
        Ok(())
    }

    fn end(&mut self, outbox: &mut Outbox) {
        self.main_clock.cancel();
        self.trial_clock.cancel();
        for (seat, profile) in self.seats.iter().zip(&self.profiles) {
            if profile.role.is_adversary() {
                outbox.leave(self.adversary_channel.as_str(), seat.user_id.as_str());
            }
        }
        self.reset();
    }

    fn tick(&mut self, outbox: &mut Outbox) -> TickOutcome {
        if self.stage != Stage::Playing {
            return TickOutcome::Continue;
        }

        if self.trial_clock.is_running() {
            self.tick_trial(outbox);
        } else if let Some(tick) = self.main_clock.tick() {
            self.broadcast_time(tick.shown, outbox);
            if tick.expired {
                self.on_main_expired(outbox);
            }
        }
        TickOutcome::Continue
    }

    fn clock_running(&self) -> bool {
        self.main_clock.is_running() || self.trial_clock.is_running()
    }

    fn snapshot(&self) -> Option<GameSnapshot> {
        if self.stage == Stage::Idle {
            return None;
        }
        let time_remaining = if self.trial_clock.is_running() {
            self.trial_clock.remaining()
        } else {
            self.main_clock.remaining()
        };
        Some(GameSnapshot::Mafia {
            phase: self.phase,
            is_recap: self.is_recap,
            time_remaining,
            alive: self.profiles.iter().map(|profile| profile.is_alive).collect(),
            trial: self.accused(),
        })
    }

    fn seat_departed(&self, index: usize, outbox: &mut Outbox) {
        if let Some(seat) = self.adversary_seat(index) {
            outbox.leave(self.adversary_channel.as_str(), seat.user_id.as_str());
        }
    }

    fn seat_returned(&self, index: usize, outbox: &mut Outbox) {
        if let Some(seat) = self.adversary_seat(index) {
            outbox.join(self.adversary_channel.as_str(), seat.user_id.as_str());
        }
    }

    fn resync(&self, index: usize, outbox: &mut Outbox) {
        let (Some(seat), Some(profile)) = (self.seats.get(index), self.profiles.get(index)) else {
            return;
        };

        outbox.send_to(
            seat.user_id.as_str(),
            ServerMessage::RoleAssigned {
                index,
                role: profile.role,
            },
        );
        outbox.send_to(
            seat.user_id.as_str(),
            ServerMessage::GameState {
                state: self.snapshot(),
            },
        );
        if let Stage::Over(winner) = self.stage {
            outbox.send_to(
                seat.user_id.as_str(),
                ServerMessage::GameOver {
                    winner,
                    won: profile.role.faction() == winner,
                    roles: (0..self.profiles.len()).map(|i| self.reveal(i)).collect(),
                },
            );
        }
    }
}
