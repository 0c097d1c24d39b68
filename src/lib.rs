//! Library crate for party-rooms-back, exposing modules for the binary and tests.

/// Configuration loading.
pub mod config;
/// Wire types exchanged with clients.
pub mod dto;
/// Error types of the room, service and HTTP layers.
pub mod error;
/// Game engines.
pub mod game;
/// HTTP and WebSocket routes.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// Shared state: players, rooms and the socket hub.
pub mod state;
