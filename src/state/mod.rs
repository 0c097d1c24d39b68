/// Server-side countdowns.
pub mod clock;
/// Notification delivery.
pub mod hub;
/// Identity registry.
pub mod players;
/// Room membership and lifecycle.
pub mod room;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, watch};

use crate::config::AppConfig;

use self::{
    hub::ChannelHub,
    players::PlayerRegistry,
    room::{RoomCommand, RoomSummary},
};

/// State handle shared by every route and task.
pub type SharedState = Arc<AppState>;

/// Directory entry of a live room task.
#[derive(Clone)]
pub struct RoomHandle {
    /// Queue of the room task.
    pub commands: mpsc::UnboundedSender<RoomCommand>,
    /// Latest listing view, republished after every command and tick.
    pub summary: watch::Receiver<RoomSummary>,
}

/// Central application state: identities, the room directory and the socket hub.
pub struct AppState {
    config: Arc<AppConfig>,
    players: PlayerRegistry,
    rooms: DashMap<String, RoomHandle>,
    hub: ChannelHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config: Arc::new(config),
            players: PlayerRegistry::new(),
            rooms: DashMap::new(),
            hub: ChannelHub::new(),
        })
    }

    /// Shared runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// Registry of every known player.
    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    /// Live rooms keyed by their join code.
    pub fn rooms(&self) -> &DashMap<String, RoomHandle> {
        &self.rooms
    }

    /// Socket hub every room flushes into.
    pub fn hub(&self) -> &ChannelHub {
        &self.hub
    }

    /// Command sender of `room_id`, if the room is still registered.
    pub fn room_sender(&self, room_id: &str) -> Option<mpsc::UnboundedSender<RoomCommand>> {
        self.rooms
            .get(room_id)
            .map(|handle| handle.commands.clone())
    }
}
