use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::room::{RoomInfo, RoomListQuery},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Read-only room browsing.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms", get(list_rooms))
}

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    params(RoomListQuery),
    responses(
        (status = 200, description = "Public rooms waiting in their lobby", body = [RoomInfo]),
        (status = 400, description = "Unknown game kind")
    )
)]
/// List public rooms that have not started a game, optionally for one game kind.
pub async fn list_rooms(
    State(state): State<SharedState>,
    Query(query): Query<RoomListQuery>,
) -> Result<Json<Vec<RoomInfo>>, AppError> {
    let kind = query
        .game
        .as_deref()
        .map(room_service::parse_game_kind)
        .transpose()?;
    Ok(Json(room_service::list_rooms(&state, kind)))
}
