use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness with the number of open rooms and connected players.
pub fn health_status(state: &SharedState) -> HealthResponse {
    HealthResponse::ok(state.rooms().len(), state.players().connected_count())
}
