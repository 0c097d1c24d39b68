//! Delivery of server notifications to sockets and named channels.

use axum::extract::ws::Message;
use dashmap::DashMap;
use indexmap::IndexSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::ws::ServerMessage;

/// Primitives the rooms need from the transport layer.
pub trait Transport: Send + Sync {
    /// Unicast to one player's current connection.
    fn send_to(&self, user_id: &str, message: &ServerMessage);
    /// Multicast to every member of a named channel.
    fn broadcast(&self, channel: &str, message: &ServerMessage);
    /// Subscribe a player to a named channel.
    fn join(&self, channel: &str, user_id: &str);
    /// Unsubscribe a player from a named channel.
    fn leave(&self, channel: &str, user_id: &str);
}

/// One deferred transport operation recorded by room or game logic.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Unicast to one player.
    Direct {
        user_id: String,
        message: ServerMessage,
    },
    /// Multicast on a channel.
    Channel {
        channel: String,
        message: ServerMessage,
    },
    /// Channel subscription.
    Join {
        channel: String,
        user_id: String,
    },
    /// Channel unsubscription.
    Leave {
        channel: String,
        user_id: String,
    },
}

/// Ordered buffer of notifications produced while handling one command or tick.
///
/// Room and game code only ever write here; the room task flushes the buffer
/// through a [`Transport`] once the handler has returned.
#[derive(Debug, Default)]
pub struct Outbox {
    items: Vec<Outbound>,
}

impl Outbox {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message for one player.
    pub fn send_to(&mut self, user_id: impl Into<String>, message: ServerMessage) {
        self.items.push(Outbound::Direct {
            user_id: user_id.into(),
            message,
        });
    }

    /// Queue a message for every subscriber of `channel`.
    pub fn broadcast(&mut self, channel: impl Into<String>, message: ServerMessage) {
        self.items.push(Outbound::Channel {
            channel: channel.into(),
            message,
        });
    }

    /// Queue a subscription; it takes effect in order with the messages around it.
    pub fn join(&mut self, channel: impl Into<String>, user_id: impl Into<String>) {
        self.items.push(Outbound::Join {
            channel: channel.into(),
            user_id: user_id.into(),
        });
    }

    /// Queue an unsubscription.
    pub fn leave(&mut self, channel: impl Into<String>, user_id: impl Into<String>) {
        self.items.push(Outbound::Leave {
            channel: channel.into(),
            user_id: user_id.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Buffered operations in the order they were recorded.
    pub fn items(&self) -> &[Outbound] {
        &self.items
    }

    /// Messages sent privately to `user_id`.
    pub fn direct_to<'a>(
        &'a self,
        user_id: &str,
    ) -> impl Iterator<Item = &'a ServerMessage> + use<'a> {
        let user_id = user_id.to_owned();
        self.items.iter().filter_map(move |item| match item {
            Outbound::Direct {
                user_id: target,
                message,
            } if *target == user_id => Some(message),
            _ => None,
        })
    }

    /// Messages multicast on `channel`.
    pub fn on_channel<'a>(
        &'a self,
        channel: &str,
    ) -> impl Iterator<Item = &'a ServerMessage> + use<'a> {
        let channel = channel.to_owned();
        self.items.iter().filter_map(move |item| match item {
            Outbound::Channel {
                channel: target,
                message,
            } if *target == channel => Some(message),
            _ => None,
        })
    }

    /// Drop everything buffered so far.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Hand every buffered operation to the transport in order.
    pub fn flush(&mut self, transport: &dyn Transport) {
        for item in self.items.drain(..) {
            match item {
                Outbound::Direct { user_id, message } => transport.send_to(&user_id, &message),
                Outbound::Channel { channel, message } => transport.broadcast(&channel, &message),
                Outbound::Join { channel, user_id } => transport.join(&channel, &user_id),
                Outbound::Leave { channel, user_id } => transport.leave(&channel, &user_id),
            }
        }
    }
}

/// Handle used to push frames to a connected client.
#[derive(Clone)]
pub struct ClientConnection {
    /// Identifier of the socket, used to tell reconnects apart.
    pub id: Uuid,
    /// Writer queue of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// WebSocket-backed [`Transport`].
///
/// Channel membership is keyed by user id rather than by socket, so a player
/// who reconnects keeps every channel they were subscribed to.
#[derive(Default)]
pub struct ChannelHub {
    connections: DashMap<String, ClientConnection>,
    channels: DashMap<String, IndexSet<String>>,
}

impl ChannelHub {
    /// Hub with no sockets and no channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a socket to `user_id`, replacing any previous socket.
    pub fn register(&self, user_id: &str, connection: ClientConnection) {
        if let Some(previous) = self.connections.insert(user_id.to_string(), connection) {
            debug!(user_id = %user_id, connection = %previous.id, "replaced existing connection");
            let _ = previous.tx.send(Message::Close(None));
        }
    }

    /// Detach `user_id` if its current socket is `connection_id`.
    ///
    /// Returns `false` when a newer socket already took over.
    pub fn unregister(&self, user_id: &str, connection_id: Uuid) -> bool {
        self.connections
            .remove_if(user_id, |_, current| current.id == connection_id)
            .is_some()
    }

    fn deliver(&self, user_id: &str, payload: &str) {
        let Some(tx) = self.connections.get(user_id).map(|conn| conn.tx.clone()) else {
            debug!(user_id = %user_id, "dropping message for disconnected player");
            return;
        };

        if tx.send(Message::Text(payload.to_owned().into())).is_err() {
            debug!(user_id = %user_id, "writer closed while delivering message");
        }
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}

impl Transport for ChannelHub {
    fn send_to(&self, user_id: &str, message: &ServerMessage) {
        if let Some(payload) = encode(message) {
            self.deliver(user_id, &payload);
        }
    }

    fn broadcast(&self, channel: &str, message: &ServerMessage) {
        let members: Vec<String> = match self.channels.get(channel) {
            Some(members) => members.iter().cloned().collect(),
            None => return,
        };

        if let Some(payload) = encode(message) {
            for user_id in members {
                self.deliver(&user_id, &payload);
            }
        }
    }

    fn join(&self, channel: &str, user_id: &str) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    fn leave(&self, channel: &str, user_id: &str) {
        let now_empty = match self.channels.get_mut(channel) {
            Some(mut members) => {
                members.shift_remove(user_id);
                members.is_empty()
            }
            None => false,
        };

        if now_empty {
            self.channels.remove_if(channel, |_, members| members.is_empty());
        }
    }
}
