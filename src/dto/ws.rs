//! Realtime protocol exchanged over `/ws`.
//!
//! Every frame is a JSON text frame tagged by `"type"`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{
        room::RoomInfo,
        settings::{RoomSettings, TopicSet},
        validation::{validate_chat_message, validate_user_id, validate_username},
    },
    game::{
        GameKind,
        mafia::{Faction, Investigation, Role, SeatReveal, Verdict, VoteTarget},
    },
};

/// Messages accepted from clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// First frame of every connection.
    #[serde(rename_all = "camelCase")]
    Identify { user_id: String, username: String },
    CreateRoom { settings: RoomSettings },
    ListRooms { game: GameKind },
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    LeaveRoom,
    UpdateSettings { settings: RoomSettings },
    StartGame,
    ReturnToLobby,
    Chat { message: String },
    /// Day vote; repeating the current choice retracts it.
    VotePlayer { target: VoteTarget },
    /// Trial decision; repeating the current decision retracts it.
    VoteGuilty { verdict: Verdict },
    /// Night power target; repeating the current target clears it.
    TargetPlayer { target: usize },
    /// Host-only: end the current day immediately.
    ForceEndDay,
    GetGameState,
    ForceDisconnect,
}

/// Reasons an inbound frame is refused before reaching a room.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("malformed message: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid field: {0}")]
    InvalidField(#[from] ValidationError),
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] ValidationErrors),
}

impl ClientMessage {
    /// Parse a text frame and validate its free-form fields.
    pub fn from_json_str(raw: &str) -> Result<Self, InboundError> {
        let message: ClientMessage = serde_json::from_str(raw)?;
        message.check()?;
        Ok(message)
    }

    fn check(&self) -> Result<(), InboundError> {
        match self {
            ClientMessage::Identify { user_id, username } => {
                validate_user_id(user_id)?;
                validate_username(username)?;
            }
            ClientMessage::JoinRoom { room_id } => {
                if room_id.trim().is_empty() {
                    let mut err = ValidationError::new("room_id_empty");
                    err.message = Some("Room id must not be empty".into());
                    return Err(err.into());
                }
            }
            ClientMessage::Chat { message } => validate_chat_message(message)?,
            ClientMessage::CreateRoom { settings } | ClientMessage::UpdateSettings { settings } => {
                settings.validate()?
            }
            _ => {}
        }
        Ok(())
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Identify { .. } => "identify",
            ClientMessage::CreateRoom { .. } => "createRoom",
            ClientMessage::ListRooms { .. } => "listRooms",
            ClientMessage::JoinRoom { .. } => "joinRoom",
            ClientMessage::LeaveRoom => "leaveRoom",
            ClientMessage::UpdateSettings { .. } => "updateSettings",
            ClientMessage::StartGame => "startGame",
            ClientMessage::ReturnToLobby => "returnToLobby",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::VotePlayer { .. } => "votePlayer",
            ClientMessage::VoteGuilty { .. } => "voteGuilty",
            ClientMessage::TargetPlayer { .. } => "targetPlayer",
            ClientMessage::ForceEndDay => "forceEndDay",
            ClientMessage::GetGameState => "getGameState",
            ClientMessage::ForceDisconnect => "forceDisconnect",
        }
    }
}

/// One line of a room roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    /// Seat index.
    pub index: usize,
    /// Display name.
    pub name: String,
    /// Present in the room with a live socket.
    pub connected: bool,
}

/// Audience a chat line was delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatScope {
    /// Everyone in the room.
    Room,
    /// Adversary sub-channel only.
    Adversaries,
    /// Spectators of a running game.
    Spectators,
    /// Echoed back to the sender only.
    Own,
}

/// Public view of a running game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameSnapshot {
    #[serde(rename_all = "camelCase")]
    Mafia {
        phase: u32,
        is_recap: bool,
        time_remaining: i64,
        alive: Vec<bool>,
        trial: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    Spyfall { time_remaining: i64 },
}

/// Notifications pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Identified {
        user_id: String,
        username: String,
        room_id: Option<String>,
    },
    CreatedRoom {
        room: RoomInfo,
    },
    YouJoined {
        room: RoomInfo,
        index: usize,
        spectator: bool,
    },
    AvailableRooms {
        rooms: Vec<RoomInfo>,
    },
    InvalidRoom {
        message: String,
    },
    Roster {
        members: Vec<RosterEntry>,
    },
    PlayerLeft {
        index: usize,
    },
    HostChanged {
        name: String,
    },
    SpectatorJoined {
        index: usize,
        name: String,
    },
    SpectatorLeft {
        index: usize,
    },
    Settings {
        settings: RoomSettings,
    },
    GameStarted {
        game: GameKind,
    },
    /// Fresh seat index after the lobby renumbering.
    IndexAssigned {
        index: usize,
    },
    ReturnedToLobby {
        members: Vec<RosterEntry>,
    },
    RoleAssigned {
        index: usize,
        role: Role,
    },
    #[serde(rename_all = "camelCase")]
    MainTimeUpdate {
        phase: u32,
        time_remaining: i64,
        is_recap: bool,
    },
    #[serde(rename_all = "camelCase")]
    SecondaryTimeUpdate {
        time_remaining: i64,
        is_defending: bool,
    },
    VoteUpdate {
        voter: usize,
        target: Option<VoteTarget>,
        tallies: Vec<usize>,
        abstaining: usize,
        message: String,
    },
    VoteAck {
        message: String,
    },
    VotingAbstained {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    BeginTrial {
        accused: usize,
        name: String,
        defense_seconds: i64,
    },
    GuiltVotingOpened {
        accused: usize,
        seconds: i64,
    },
    GuiltVoteUpdate {
        voter: usize,
        verdict: Option<Verdict>,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    TrialVerdict {
        accused: usize,
        name: String,
        guilty: bool,
        guilty_votes: usize,
        innocent_votes: usize,
        role: Option<Role>,
    },
    TargetUpdate {
        actor: usize,
        target: Option<usize>,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    NightResult {
        night: u32,
        was_attacked: bool,
        was_saved: bool,
        investigation: Option<Investigation>,
        notes: Vec<String>,
    },
    NightRecap {
        night: u32,
        deaths: Vec<SeatReveal>,
    },
    /// Role-reveal line of the public recap, sent to the detective only.
    DetectiveReveal {
        night: u32,
        index: usize,
        name: String,
        role: Role,
    },
    StalemateBroken {
        victim: SeatReveal,
    },
    ChatMessage {
        from: Option<usize>,
        name: String,
        message: String,
        scope: ChatScope,
    },
    GameOver {
        winner: Faction,
        won: bool,
        roles: Vec<SeatReveal>,
    },
    GameState {
        state: Option<GameSnapshot>,
    },
    #[serde(rename_all = "camelCase")]
    SpyfallAssignment {
        index: usize,
        is_outsider: bool,
        topic: TopicSet,
        topics: Vec<String>,
        secret: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SpyfallTimeUpdate {
        time_remaining: i64,
    },
    GameEnded {
        outsider: usize,
        name: String,
        secret: String,
    },
    ActionRejected {
        reason: String,
    },
}
