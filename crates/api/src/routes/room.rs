use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub success: bool,
    pub room_id: String,
}

/// Key generation plus a map insert; the room fills in over the socket.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    if body.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }

    let room_id = Uuid::new_v4().to_string();
    state.store.get_or_create(&room_id);
    info!(%room_id, username = %body.username.trim(), "room created over HTTP");

    Ok(Json(CreateRoomResponse {
        success: true,
        room_id,
    }))
}

pub async fn lookup(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "exists": state.store.exists(&room_id) }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatusResponse {
    pub is_active: bool,
    pub participant_count: usize,
}

/// Call-status probe. Unknown rooms read as "no call" rather than an error.
pub async fn call_status(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Json<CallStatusResponse> {
    let (is_active, participant_count) = state.store.call_status(&room_id);
    Json(CallStatusResponse {
        is_active,
        participant_count,
    })
}
