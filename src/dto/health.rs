use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process serves requests.
    pub status: String,
    /// Rooms currently open.
    pub rooms: usize,
    /// Players with a live connection.
    pub players: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(rooms: usize, players: usize) -> Self {
        Self {
            status: "ok".to_string(),
            rooms,
            players,
        }
    }
}
