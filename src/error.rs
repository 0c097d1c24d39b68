use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::game::GameError;

/// Reasons a room refuses a command.
///
/// Sent back to the issuing player as an `actionRejected` notification; the
/// room itself keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Only the host may do this.
    #[error("only the host can do that")]
    NotHost,
    /// The player is not a member of the room.
    #[error("you are not playing in this room")]
    NotInRoom,
    /// The action is only available from the lobby.
    #[error("a game is already in progress")]
    AlreadyInGame,
    /// The action needs a running game.
    #[error("no game is in progress")]
    NotInGame,
    /// The hosted game has no such action.
    #[error("{0} is not available in this game")]
    UnsupportedAction(&'static str),
    /// Rejected by the game rules.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The room task is gone or no longer accepts commands.
    #[error("room `{0}` is closed")]
    RoomClosed(String),
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::RoomClosed(room_id) => {
                AppError::Conflict(format!("room `{room_id}` is closed"))
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
