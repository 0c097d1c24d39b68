use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::room_service,
    state::{SharedState, hub::ClientConnection, room::RoomCommand},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of handling one client frame that is not a plain rejection.
#[derive(Debug, Error)]
enum DispatchError {
    /// Writer channel closed; the connection should be terminated.
    #[error("connection closed")]
    ConnectionClosed,
    /// The client asked to be disconnected.
    #[error("client requested disconnect")]
    Disconnect,
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of one player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let (user_id, username) = match ClientMessage::from_json_str(&initial_message) {
        Ok(ClientMessage::Identify { user_id, username }) => (user_id, username),
        Ok(other) => {
            warn!(kind = other.kind(), "first message was not identification");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse or validate identification");
            let _ = send_message_to_websocket(
                &outbound_tx,
                &ServerMessage::ActionRejected {
                    reason: err.to_string(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    let player = state.players().connect(&user_id, &username, connection_id);
    state.hub().register(
        &user_id,
        ClientConnection {
            id: connection_id,
            tx: outbound_tx.clone(),
        },
    );
    info!(user_id = %user_id, connection = %connection_id, "player connected");

    let identified = ServerMessage::Identified {
        user_id: user_id.clone(),
        username: player.username.clone(),
        room_id: player.room_id.clone(),
    };
    if send_message_to_websocket(&outbound_tx, &identified).is_err() {
        disconnect(&state, &user_id, connection_id);
        finalize(writer_task, outbound_tx).await;
        return;
    }
    if let Some(room_id) = player.room_id {
        resume_room(&state, &user_id, &room_id);
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let result = match ClientMessage::from_json_str(&text) {
                    Ok(message) => {
                        debug!(user_id = %user_id, kind = message.kind(), "received client message");
                        dispatch(&state, &user_id, &outbound_tx, message)
                    }
                    Err(err) => {
                        warn!(user_id = %user_id, error = %err, "failed to parse or validate client message");
                        reject(&outbound_tx, err.to_string())
                    }
                };

                match result {
                    Ok(()) => {}
                    Err(DispatchError::Disconnect) => {
                        info!(user_id = %user_id, "client requested disconnect");
                        let _ = outbound_tx.send(Message::Close(None));
                        break;
                    }
                    Err(DispatchError::ConnectionClosed) => {
                        info!(user_id = %user_id, "connection closed while replying, terminating");
                        break;
                    }
                    Err(DispatchError::Service(err)) => {
                        warn!(user_id = %user_id, error = %err, "client request failed");
                        if reject(&outbound_tx, err.to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(user_id = %user_id, "player closed connection");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    disconnect(&state, &user_id, connection_id);
    finalize(writer_task, outbound_tx).await;
}

/// Re-send the room view to a reconnecting player, or forget a room that is gone.
fn resume_room(state: &SharedState, user_id: &str, room_id: &str) {
    let command = RoomCommand::Resync {
        user_id: user_id.to_string(),
    };
    if room_service::forward(state, room_id, command).is_err() {
        debug!(user_id = %user_id, room_id = %room_id, "room closed while player was away");
        state.players().clear_room(user_id, room_id);
    }
}

fn disconnect(state: &SharedState, user_id: &str, connection_id: Uuid) {
    state.hub().unregister(user_id, connection_id);
    if state.players().disconnect(user_id, connection_id) {
        info!(user_id = %user_id, "player disconnected");
    }
}

/// Room command carried by a client message, if it targets the player's room.
fn room_command(user_id: &str, message: ClientMessage) -> Option<RoomCommand> {
    let user_id = user_id.to_string();
    let command = match message {
        ClientMessage::UpdateSettings { settings } => RoomCommand::UpdateSettings { user_id, settings },
        ClientMessage::StartGame => RoomCommand::Start { user_id },
        ClientMessage::ReturnToLobby => RoomCommand::ReturnToLobby { user_id },
        ClientMessage::Chat { message } => RoomCommand::Chat { user_id, message },
        ClientMessage::VotePlayer { target } => RoomCommand::VotePlayer { user_id, target },
        ClientMessage::VoteGuilty { verdict } => RoomCommand::VoteGuilty { user_id, verdict },
        ClientMessage::TargetPlayer { target } => RoomCommand::TargetPlayer { user_id, target },
        ClientMessage::ForceEndDay => RoomCommand::ForceEndDay { user_id },
        ClientMessage::GetGameState => RoomCommand::GameState { user_id },
        ClientMessage::Identify { .. }
        | ClientMessage::CreateRoom { .. }
        | ClientMessage::ListRooms { .. }
        | ClientMessage::JoinRoom { .. }
        | ClientMessage::LeaveRoom
        | ClientMessage::ForceDisconnect => return None,
    };
    Some(command)
}

fn dispatch(
    state: &SharedState,
    user_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    message: ClientMessage,
) -> Result<(), DispatchError> {
    match message {
        ClientMessage::Identify { .. } => {
            warn!(user_id = %user_id, "ignoring duplicate identification message");
        }
        ClientMessage::CreateRoom { settings } => {
            room_service::create_room(state, user_id, settings)?;
        }
        ClientMessage::ListRooms { game } => {
            let rooms = room_service::list_rooms(state, Some(game));
            send_message_to_websocket(tx, &ServerMessage::AvailableRooms { rooms })?;
        }
        ClientMessage::JoinRoom { room_id } => {
            match room_service::join_room(state, user_id, room_id.trim()) {
                // The player was already told through `invalidRoom`.
                Err(ServiceError::NotFound(_)) => {}
                other => other?,
            }
        }
        ClientMessage::LeaveRoom => room_service::leave_current_room(state, user_id),
        ClientMessage::ForceDisconnect => return Err(DispatchError::Disconnect),
        other => {
            if let Some(command) = room_command(user_id, other) {
                room_service::forward_to_current_room(state, user_id, command)?;
            }
        }
    }
    Ok(())
}

fn reject(tx: &mpsc::UnboundedSender<Message>, reason: String) -> Result<(), DispatchError> {
    send_message_to_websocket(tx, &ServerMessage::ActionRejected { reason })
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; only a closed writer is
/// reported to the caller.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), DispatchError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| DispatchError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
