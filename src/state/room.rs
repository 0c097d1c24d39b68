//! Game-agnostic room: membership, host succession and lobby/in-game lifecycle.

use std::{collections::HashSet, time::SystemTime};

use tracing::{debug, info};

use crate::{
    config::AppConfig,
    dto::{
        format_system_time,
        room::RoomInfo,
        settings::RoomSettings,
        ws::{ChatScope, RosterEntry, ServerMessage},
    },
    error::RoomError,
    game::{
        Game, GameVariant, Seat, TickOutcome,
        mafia::{Verdict, VoteTarget},
    },
    state::{hub::Outbox, players::PlayerRegistry},
};

/// Whether the room survives an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// The room stays open.
    Keep,
    /// The room is empty and its task should stop.
    Delete,
}

/// Work delivered to a room task.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomCommand {
    /// Take a seat, or watch while a game runs.
    Join { user_id: String },
    /// Give up the seat; mid-game the seat stays in place.
    Leave { user_id: String },
    /// Re-send the player's view after a reconnect.
    Resync { user_id: String },
    /// Host only, lobby only.
    UpdateSettings { user_id: String, settings: RoomSettings },
    /// Host only.
    Start { user_id: String },
    /// Host only; abandons the running game.
    ReturnToLobby { user_id: String },
    Chat { user_id: String, message: String },
    /// Day vote.
    VotePlayer { user_id: String, target: VoteTarget },
    /// Trial vote.
    VoteGuilty { user_id: String, verdict: Verdict },
    /// Night power target.
    TargetPlayer { user_id: String, target: usize },
    /// Host only.
    ForceEndDay { user_id: String },
    /// Public snapshot of the running game.
    GameState { user_id: String },
}

impl RoomCommand {
    /// Player who issued the command.
    pub fn user_id(&self) -> &str {
        match self {
            RoomCommand::Join { user_id }
            | RoomCommand::Leave { user_id }
            | RoomCommand::Resync { user_id }
            | RoomCommand::UpdateSettings { user_id, .. }
            | RoomCommand::Start { user_id }
            | RoomCommand::ReturnToLobby { user_id }
            | RoomCommand::Chat { user_id, .. }
            | RoomCommand::VotePlayer { user_id, .. }
            | RoomCommand::VoteGuilty { user_id, .. }
            | RoomCommand::TargetPlayer { user_id, .. }
            | RoomCommand::ForceEndDay { user_id }
            | RoomCommand::GameState { user_id } => user_id,
        }
    }
}

/// Listing view of a room published by its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    /// Public listing entry.
    pub info: RoomInfo,
    /// User id of the acting host.
    pub host_id: Option<String>,
}

/// A party of players sharing one game instance.
///
/// `members` holds user ids; while a game runs it is never reordered, since
/// games address players by their position in it.
#[derive(Debug)]
pub struct Room {
    id: String,
    members: Vec<String>,
    spectators: Vec<String>,
    /// Members who left while a game was running; their seat stays in place.
    departed: HashSet<String>,
    is_private: bool,
    in_game: bool,
    total_active: usize,
    game: GameVariant,
    created_at: SystemTime,
}

impl Room {
    /// Empty lobby for `id` hosting the game configured by `settings`.
    pub fn new(id: &str, settings: RoomSettings, config: &AppConfig) -> Self {
        Self {
            id: id.to_string(),
            members: Vec::new(),
            spectators: Vec::new(),
            departed: HashSet::new(),
            is_private: settings.is_private,
            in_game: false,
            total_active: 0,
            game: GameVariant::from_settings(id, settings.rules, config),
            created_at: SystemTime::now(),
        }
    }

    /// Join code.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Member user ids in seat order, including departed seats while a game runs.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Players watching the running game.
    pub fn spectators(&self) -> &[String] {
        &self.spectators
    }

    /// Whether a game is running.
    pub fn in_game(&self) -> bool {
        self.in_game
    }

    /// Acting host: the first member who has not left the running game.
    ///
    /// In the lobby this is always the first member.
    pub fn host(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|member| !self.departed.contains(*member))
            .map(String::as_str)
    }

    /// Hosted game.
    pub fn game(&self) -> &GameVariant {
        &self.game
    }

    /// Whether the room task should tick this room.
    pub fn clock_running(&self) -> bool {
        self.in_game && self.game.clock_running()
    }

    fn spectator_channel(&self) -> String {
        format!("{}:spectators", self.id)
    }

    /// Current room and game settings.
    pub fn settings(&self) -> RoomSettings {
        RoomSettings {
            is_private: self.is_private,
            rules: self.game.settings(),
        }
    }

    fn name_of(players: &PlayerRegistry, user_id: &str) -> String {
        players
            .username(user_id)
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn roster(&self, players: &PlayerRegistry) -> Vec<RosterEntry> {
        self.members
            .iter()
            .enumerate()
            .map(|(index, user_id)| RosterEntry {
                index,
                name: Self::name_of(players, user_id),
                connected: players.is_connected(user_id) && !self.departed.contains(user_id),
            })
            .collect()
    }

    /// Public listing entry.
    pub fn info(&self, players: &PlayerRegistry) -> RoomInfo {
        RoomInfo {
            room_id: self.id.clone(),
            game: self.game.kind(),
            host: self
                .host()
                .map(|host| Self::name_of(players, host))
                .unwrap_or_default(),
            members: self
                .members
                .iter()
                .map(|user_id| Self::name_of(players, user_id))
                .collect(),
            spectators: self.spectators.len(),
            is_private: self.is_private,
            in_game: self.in_game,
            created_at: format_system_time(self.created_at),
        }
    }

    /// Listing entry together with the acting host's id.
    pub fn summary(&self, players: &PlayerRegistry) -> RoomSummary {
        RoomSummary {
            info: self.info(players),
            host_id: self.host().map(str::to_string),
        }
    }

    /// Seat of an active member.
    fn seat_of(&self, user_id: &str) -> Result<usize, RoomError> {
        if self.departed.contains(user_id) {
            return Err(RoomError::NotInRoom);
        }
        self.members
            .iter()
            .position(|member| member == user_id)
            .ok_or(RoomError::NotInRoom)
    }

    fn ensure_host(&self, user_id: &str) -> Result<(), RoomError> {
        if self.host() == Some(user_id) {
            Ok(())
        } else {
            Err(RoomError::NotHost)
        }
    }

    /// Announce the acting host if it differs from `previous`.
    fn announce_host(
        &self,
        previous: Option<&str>,
        players: &PlayerRegistry,
        outbox: &mut Outbox,
    ) {
        let Some(current) = self.host() else {
            return;
        };
        if previous == Some(current) {
            return;
        }
        outbox.broadcast(
            self.id.as_str(),
            ServerMessage::HostChanged {
                name: Self::name_of(players, current),
            },
        );
        info!(room_id = %self.id, host = %current, "acting host changed");
    }

    fn broadcast_roster(&self, players: &PlayerRegistry, outbox: &mut Outbox) {
        outbox.broadcast(
            self.id.as_str(),
            ServerMessage::Roster {
                members: self.roster(players),
            },
        );
    }

    /// Add `user_id` as a member, or as a spectator while a game runs.
    pub fn add_player(&mut self, user_id: &str, players: &PlayerRegistry, outbox: &mut Outbox) {
        if self.spectators.iter().any(|s| s == user_id) {
            return;
        }
        if let Some(index) = self.members.iter().position(|m| m == user_id) {
            if self.in_game && self.departed.contains(user_id) {
                let previous = self.host().map(str::to_string);
                self.departed.remove(user_id);
                self.total_active += 1;
                players.set_room(user_id, Some(self.id.clone()));
                outbox.join(self.id.as_str(), user_id);
                self.game.seat_returned(index, outbox);
                self.broadcast_roster(players, outbox);
                self.announce_host(previous.as_deref(), players, outbox);
                self.resync_member(index, user_id, players, outbox);
                info!(room_id = %self.id, user_id = %user_id, "member rejoined running game");
            }
            return;
        }

        players.set_room(user_id, Some(self.id.clone()));
        outbox.join(self.id.as_str(), user_id);

        if self.in_game {
            let index = self.spectators.len();
            self.spectators.push(user_id.to_string());
            let channel = self.spectator_channel();
            outbox.join(channel.as_str(), user_id);
            outbox.broadcast(
                channel.as_str(),
                ServerMessage::SpectatorJoined {
                    index,
                    name: Self::name_of(players, user_id),
                },
            );
            outbox.send_to(
                user_id,
                ServerMessage::YouJoined {
                    room: self.info(players),
                    index,
                    spectator: true,
                },
            );
            outbox.send_to(
                user_id,
                ServerMessage::Settings {
                    settings: self.settings(),
                },
            );
            outbox.send_to(
                user_id,
                ServerMessage::GameState {
                    state: self.game.snapshot(),
                },
            );
            info!(room_id = %self.id, user_id = %user_id, "spectator joined");
            return;
        }

        let index = self.members.len();
        self.members.push(user_id.to_string());
        self.broadcast_roster(players, outbox);
        outbox.send_to(
            user_id,
            ServerMessage::YouJoined {
                room: self.info(players),
                index,
                spectator: false,
            },
        );
        outbox.send_to(
            user_id,
            ServerMessage::Settings {
                settings: self.settings(),
            },
        );
        info!(room_id = %self.id, user_id = %user_id, index, "player joined");
    }

    /// Remove `user_id`; unknown players are ignored.
    pub fn remove_player(
        &mut self,
        user_id: &str,
        players: &PlayerRegistry,
        outbox: &mut Outbox,
    ) -> Teardown {
        if let Some(index) = self.spectators.iter().position(|s| s == user_id) {
            self.spectators.remove(index);
            let channel = self.spectator_channel();
            outbox.leave(channel.as_str(), user_id);
            outbox.leave(self.id.as_str(), user_id);
            outbox.broadcast(channel.as_str(), ServerMessage::SpectatorLeft { index });
            players.clear_room(user_id, &self.id);
            return self.teardown_if_abandoned();
        }

        let Some(index) = self.members.iter().position(|m| m == user_id) else {
            return Teardown::Keep;
        };

        if self.in_game {
            let previous = self.host().map(str::to_string);
            if !self.departed.insert(user_id.to_string()) {
                return Teardown::Keep;
            }
            self.total_active = self.total_active.saturating_sub(1);
            outbox.leave(self.id.as_str(), user_id);
            self.game.seat_departed(index, outbox);
            players.clear_room(user_id, &self.id);
            self.broadcast_roster(players, outbox);
            self.announce_host(previous.as_deref(), players, outbox);
            info!(
                room_id = %self.id,
                user_id = %user_id,
                remaining = self.total_active,
                "member left running game"
            );
            return self.teardown_if_abandoned();
        }

        if index == 0 {
            return self.remove_host(players, outbox);
        }

        self.members.remove(index);
        outbox.leave(self.id.as_str(), user_id);
        players.clear_room(user_id, &self.id);
        outbox.broadcast(self.id.as_str(), ServerMessage::PlayerLeft { index });
        self.broadcast_roster(players, outbox);
        info!(room_id = %self.id, user_id = %user_id, index, "player left");
        Teardown::Keep
    }

    fn teardown_if_abandoned(&self) -> Teardown {
        if self.in_game && self.total_active == 0 {
            Teardown::Delete
        } else {
            Teardown::Keep
        }
    }

    /// Pass the host seat to the next member, or ask for deletion when the host is alone.
    pub fn remove_host(&mut self, players: &PlayerRegistry, outbox: &mut Outbox) -> Teardown {
        let Some(host) = self.members.first().cloned() else {
            return Teardown::Delete;
        };
        players.clear_room(&host, &self.id);
        outbox.leave(self.id.as_str(), host.as_str());

        if self.members.len() == 1 {
            self.members.clear();
            info!(room_id = %self.id, "host left an empty room");
            return Teardown::Delete;
        }

        self.members.remove(0);
        let name = self
            .host()
            .map(|next| Self::name_of(players, next))
            .unwrap_or_default();
        outbox.broadcast(self.id.as_str(), ServerMessage::PlayerLeft { index: 0 });
        outbox.broadcast(self.id.as_str(), ServerMessage::HostChanged { name });
        self.broadcast_roster(players, outbox);
        info!(room_id = %self.id, previous = %host, "host changed");
        Teardown::Keep
    }

    /// Deal the configured game to the current members.
    pub fn begin(&mut self, players: &PlayerRegistry, outbox: &mut Outbox) -> Result<(), RoomError> {
        if self.in_game {
            return Err(RoomError::AlreadyInGame);
        }
        let seats = self
            .members
            .iter()
            .map(|user_id| Seat {
                user_id: user_id.clone(),
                name: Self::name_of(players, user_id),
            })
            .collect();

        outbox.broadcast(
            self.id.as_str(),
            ServerMessage::GameStarted {
                game: self.game.kind(),
            },
        );
        if let Err(err) = self.game.begin(seats, outbox) {
            outbox.clear();
            return Err(err.into());
        }
        self.in_game = true;
        self.total_active = self.members.len();
        self.departed.clear();
        Ok(())
    }

    /// Stop the running game and release its resources.
    pub fn end(&mut self, outbox: &mut Outbox) {
        self.game.end(outbox);
        self.in_game = false;
    }

    /// End any running game and renumber the lobby.
    ///
    /// Spectators become members, departed or stale players are dropped, and
    /// every remaining member learns its new index before anything else.
    pub fn return_to_lobby(&mut self, players: &PlayerRegistry, outbox: &mut Outbox) -> Teardown {
        if self.in_game {
            self.end(outbox);
        }

        let channel = self.spectator_channel();
        for spectator in self.spectators.drain(..) {
            outbox.leave(channel.as_str(), spectator.as_str());
            self.members.push(spectator);
        }

        let departed = std::mem::take(&mut self.departed);
        let room_id = self.id.clone();
        self.members.retain(|user_id| {
            let keep = !departed.contains(user_id)
                && !players.is_stale(user_id)
                && players.room_of(user_id).as_deref() == Some(room_id.as_str());
            if !keep {
                outbox.leave(room_id.as_str(), user_id.as_str());
                players.clear_room(user_id, &room_id);
            }
            keep
        });

        if self.members.is_empty() {
            info!(room_id = %self.id, "nobody left after the game");
            return Teardown::Delete;
        }

        for (index, user_id) in self.members.iter().enumerate() {
            outbox.send_to(user_id.as_str(), ServerMessage::IndexAssigned { index });
        }
        outbox.broadcast(
            self.id.as_str(),
            ServerMessage::ReturnedToLobby {
                members: self.roster(players),
            },
        );
        outbox.broadcast(
            self.id.as_str(),
            ServerMessage::Settings {
                settings: self.settings(),
            },
        );
        info!(room_id = %self.id, members = self.members.len(), "returned to lobby");
        Teardown::Keep
    }

    /// Detach every remaining player before the room is dropped.
    pub fn release(&mut self, players: &PlayerRegistry, outbox: &mut Outbox) {
        if self.in_game {
            self.end(outbox);
        }
        let channel = self.spectator_channel();
        for user_id in self.members.iter().chain(&self.spectators) {
            players.clear_room(user_id, &self.id);
            outbox.leave(self.id.as_str(), user_id.as_str());
            outbox.leave(channel.as_str(), user_id.as_str());
        }
        self.members.clear();
        self.spectators.clear();
    }

    fn resync_member(
        &self,
        index: usize,
        user_id: &str,
        players: &PlayerRegistry,
        outbox: &mut Outbox,
    ) {
        outbox.send_to(
            user_id,
            ServerMessage::YouJoined {
                room: self.info(players),
                index,
                spectator: false,
            },
        );
        outbox.send_to(
            user_id,
            ServerMessage::Roster {
                members: self.roster(players),
            },
        );
        outbox.send_to(
            user_id,
            ServerMessage::Settings {
                settings: self.settings(),
            },
        );
        if self.in_game {
            self.game.resync(index, outbox);
        }
    }

    fn resync(&self, user_id: &str, players: &PlayerRegistry, outbox: &mut Outbox) {
        if let Some(index) = self.spectators.iter().position(|s| s == user_id) {
            outbox.send_to(
                user_id,
                ServerMessage::YouJoined {
                    room: self.info(players),
                    index,
                    spectator: true,
                },
            );
            outbox.send_to(
                user_id,
                ServerMessage::Settings {
                    settings: self.settings(),
                },
            );
            outbox.send_to(
                user_id,
                ServerMessage::GameState {
                    state: self.game.snapshot(),
                },
            );
        } else if let Ok(index) = self.seat_of(user_id) {
            self.resync_member(index, user_id, players, outbox);
        }
    }

    fn update_settings(
        &mut self,
        user_id: &str,
        settings: RoomSettings,
        outbox: &mut Outbox,
    ) -> Result<(), RoomError> {
        self.ensure_host(user_id)?;
        if self.in_game {
            return Err(RoomError::AlreadyInGame);
        }
        self.game.update_settings(settings.rules)?;
        self.is_private = settings.is_private;
        outbox.broadcast(
            self.id.as_str(),
            ServerMessage::Settings {
                settings: self.settings(),
            },
        );
        debug!(room_id = %self.id, game = self.game.kind().as_str(), "settings updated");
        Ok(())
    }

    fn chat(
        &mut self,
        user_id: &str,
        message: String,
        players: &PlayerRegistry,
        outbox: &mut Outbox,
    ) -> Result<(), RoomError> {
        let name = Self::name_of(players, user_id);

        if let Some(index) = self.spectators.iter().position(|s| s == user_id) {
            outbox.broadcast(
                self.spectator_channel().as_str(),
                ServerMessage::ChatMessage {
                    from: Some(index),
                    name,
                    message,
                    scope: ChatScope::Spectators,
                },
            );
            return Ok(());
        }

        let seat = self.seat_of(user_id)?;
        if self.in_game {
            if let Some(game) = self.game.as_mafia_mut() {
                return Ok(game.chat(seat, message, outbox)?);
            }
        }
        outbox.broadcast(
            self.id.as_str(),
            ServerMessage::ChatMessage {
                from: Some(seat),
                name,
                message,
                scope: ChatScope::Room,
            },
        );
        Ok(())
    }

    fn mafia_seat(
        &mut self,
        user_id: &str,
        action: &'static str,
    ) -> Result<(usize, &mut crate::game::MafiaGame), RoomError> {
        if !self.in_game {
            return Err(RoomError::NotInGame);
        }
        let seat = self.seat_of(user_id)?;
        let game = self
            .game
            .as_mafia_mut()
            .ok_or(RoomError::UnsupportedAction(action))?;
        Ok((seat, game))
    }

    /// Apply one command from a player.
    pub fn apply(
        &mut self,
        command: RoomCommand,
        players: &PlayerRegistry,
        outbox: &mut Outbox,
    ) -> Result<Teardown, RoomError> {
        match command {
            RoomCommand::Join { user_id } => {
                self.add_player(&user_id, players, outbox);
            }
            RoomCommand::Leave { user_id } => {
                return Ok(self.remove_player(&user_id, players, outbox));
            }
            RoomCommand::Resync { user_id } => self.resync(&user_id, players, outbox),
            RoomCommand::UpdateSettings { user_id, settings } => {
                self.update_settings(&user_id, settings, outbox)?
            }
            RoomCommand::Start { user_id } => {
                self.ensure_host(&user_id)?;
                self.begin(players, outbox)?;
            }
            RoomCommand::ReturnToLobby { user_id } => {
                self.ensure_host(&user_id)?;
                if !self.in_game {
                    return Err(RoomError::NotInGame);
                }
                return Ok(self.return_to_lobby(players, outbox));
            }
            RoomCommand::Chat { user_id, message } => {
                self.chat(&user_id, message, players, outbox)?
            }
            RoomCommand::VotePlayer { user_id, target } => {
                let (seat, game) = self.mafia_seat(&user_id, "voting")?;
                game.vote_player(seat, target, outbox)?;
            }
            RoomCommand::VoteGuilty { user_id, verdict } => {
                let (seat, game) = self.mafia_seat(&user_id, "trial voting")?;
                game.vote_guilty(seat, verdict, outbox)?;
            }
            RoomCommand::TargetPlayer { user_id, target } => {
                let (seat, game) = self.mafia_seat(&user_id, "night actions")?;
                game.track_interaction_request(seat, target, outbox)?;
            }
            RoomCommand::ForceEndDay { user_id } => {
                self.ensure_host(&user_id)?;
                let (_, game) = self.mafia_seat(&user_id, "ending the day")?;
                game.force_day_end(outbox)?;
            }
            RoomCommand::GameState { user_id } => {
                outbox.send_to(
                    user_id,
                    ServerMessage::GameState {
                        state: self.game.snapshot(),
                    },
                );
            }
        }
        Ok(Teardown::Keep)
    }

    /// One second of the active clock.
    pub fn tick(&mut self, players: &PlayerRegistry, outbox: &mut Outbox) -> Teardown {
        if !self.in_game {
            return Teardown::Keep;
        }
        match self.game.tick(outbox) {
            TickOutcome::Continue => Teardown::Keep,
            TickOutcome::Finished => self.return_to_lobby(players, outbox),
        }
    }
}
