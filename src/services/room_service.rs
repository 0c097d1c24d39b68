//! Room directory operations and the per-room task.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use rand::Rng;
use tokio::{
    sync::{mpsc, watch},
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        room::RoomInfo,
        settings::RoomSettings,
        ws::ServerMessage,
    },
    error::ServiceError,
    game::GameKind,
    state::{
        RoomHandle, SharedState,
        hub::{Outbox, Transport},
        room::{Room, RoomCommand, RoomSummary, Teardown},
    },
};

const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const TICK_PERIOD: Duration = Duration::from_secs(1);

fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

/// Room currently hosted by `user_id`.
fn hosted_room(state: &SharedState, user_id: &str) -> Option<RoomInfo> {
    state.rooms().iter().find_map(|entry| {
        let summary = entry.summary.borrow();
        (summary.host_id.as_deref() == Some(user_id)).then(|| summary.info.clone())
    })
}

/// Open a room hosted by `user_id` and seat them in it.
///
/// A player who already hosts a room gets that room back instead.
pub fn create_room(
    state: &SharedState,
    user_id: &str,
    settings: RoomSettings,
) -> Result<RoomInfo, ServiceError> {
    if let Some(existing) = hosted_room(state, user_id) {
        state.hub().send_to(
            user_id,
            &ServerMessage::CreatedRoom {
                room: existing.clone(),
            },
        );
        return Ok(existing);
    }

    leave_current_room(state, user_id);

    let config = state.config();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (room, summary_tx) = loop {
        let code = generate_room_code();
        match state.rooms().entry(code.clone()) {
            Entry::Occupied(_) => continue,
            Entry::Vacant(slot) => {
                let room = Room::new(&code, settings.clone(), &config);
                let (summary_tx, summary_rx) = watch::channel(room.summary(state.players()));
                slot.insert(RoomHandle {
                    commands: command_tx.clone(),
                    summary: summary_rx,
                });
                break (room, summary_tx);
            }
        }
    };

    let info = room.info(state.players());
    info!(
        room_id = %info.room_id,
        host = %user_id,
        game = info.game.as_str(),
        "room created"
    );
    tokio::spawn(run_room(state.clone(), room, command_rx, summary_tx));

    state.hub().send_to(user_id, &ServerMessage::CreatedRoom { room: info.clone() });
    forward(
        state,
        &info.room_id,
        RoomCommand::Join {
            user_id: user_id.to_string(),
        },
    )?;
    Ok(info)
}

/// Seat `user_id` in `room_id`, leaving any other room first.
pub fn join_room(state: &SharedState, user_id: &str, room_id: &str) -> Result<(), ServiceError> {
    if !state.rooms().contains_key(room_id) {
        state.hub().send_to(
            user_id,
            &ServerMessage::InvalidRoom {
                message: format!("{room_id} was not found."),
            },
        );
        return Err(ServiceError::NotFound(format!("room `{room_id}`")));
    }

    if state.players().room_of(user_id).as_deref() == Some(room_id) {
        return forward(
            state,
            room_id,
            RoomCommand::Resync {
                user_id: user_id.to_string(),
            },
        );
    }

    leave_current_room(state, user_id);
    forward(
        state,
        room_id,
        RoomCommand::Join {
            user_id: user_id.to_string(),
        },
    )
}

/// Ask the player's current room, if any, to let them go.
pub fn leave_current_room(state: &SharedState, user_id: &str) {
    let Some(room_id) = state.players().room_of(user_id) else {
        return;
    };
    let command = RoomCommand::Leave {
        user_id: user_id.to_string(),
    };
    if let Err(err) = forward(state, &room_id, command) {
        debug!(user_id = %user_id, error = %err, "previous room already gone");
        state.players().clear_room(user_id, &room_id);
    }
}

/// Public rooms waiting in their lobby, oldest first.
pub fn list_rooms(state: &SharedState, kind: Option<GameKind>) -> Vec<RoomInfo> {
    let mut rooms: Vec<RoomInfo> = state
        .rooms()
        .iter()
        .map(|entry| entry.summary.borrow().info.clone())
        .filter(|info| !info.is_private && !info.in_game)
        .filter(|info| kind.is_none_or(|kind| info.game == kind))
        .collect();
    rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    rooms
}

/// Game kind named by a listing filter.
pub fn parse_game_kind(raw: &str) -> Result<GameKind, ServiceError> {
    GameKind::ALL
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(raw.trim()))
        .ok_or_else(|| ServiceError::InvalidInput(format!("unknown game `{raw}`")))
}

/// Send `command` to the task of the player's current room.
pub fn forward_to_current_room(
    state: &SharedState,
    user_id: &str,
    command: RoomCommand,
) -> Result<(), ServiceError> {
    let room_id = state
        .players()
        .room_of(user_id)
        .ok_or_else(|| ServiceError::InvalidInput("you are not in a room".into()))?;
    forward(state, &room_id, command)
}

/// Queue `command` on the task of `room_id`.
pub fn forward(state: &SharedState, room_id: &str, command: RoomCommand) -> Result<(), ServiceError> {
    let sender = state
        .room_sender(room_id)
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}`")))?;
    sender
        .send(command)
        .map_err(|_| ServiceError::RoomClosed(room_id.to_string()))
}

/// Own `room` until it empties: apply commands in arrival order and tick its clock.
async fn run_room(
    state: SharedState,
    mut room: Room,
    mut commands: mpsc::UnboundedReceiver<RoomCommand>,
    summary: watch::Sender<RoomSummary>,
) {
    let mut ticker = interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut outbox = Outbox::new();

    loop {
        let clock_was_running = room.clock_running();
        let teardown = tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    break;
                };
                let user_id = command.user_id().to_string();
                match room.apply(command, state.players(), &mut outbox) {
                    Ok(teardown) => teardown,
                    Err(err) => {
                        warn!(
                            room_id = %room.id(),
                            user_id = %user_id,
                            error = %err,
                            "rejected room command"
                        );
                        outbox.send_to(
                            user_id,
                            ServerMessage::ActionRejected {
                                reason: err.to_string(),
                            },
                        );
                        Teardown::Keep
                    }
                }
            }
            _ = ticker.tick(), if clock_was_running => room.tick(state.players(), &mut outbox),
        };

        if !clock_was_running && room.clock_running() {
            ticker.reset();
        }
        outbox.flush(state.hub());
        summary.send_replace(room.summary(state.players()));

        if teardown == Teardown::Delete {
            break;
        }
    }

    room.release(state.players(), &mut outbox);
    outbox.flush(state.hub());
    state.rooms().remove(room.id());
    info!(room_id = %room.id(), "room deleted");
}
