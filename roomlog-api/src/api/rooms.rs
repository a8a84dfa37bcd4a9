//! Room listing endpoint

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth, db,
    error::{ApiError, ApiResult},
    AppState,
};

/// One room in a project listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: Uuid,
    pub name: String,
    pub image_count: i64,
    pub created_at: DateTime<Utc>,
}

/// GET /api/projects/:project_id/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<RoomSummary>>> {
    let auth = auth::authenticate(&state.db, &headers).await?;

    let project = db::projects::find_for_org(&state.db, auth.org_id, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project: {}", project_id)))?;

    let rooms = db::rooms::list_for_project(&state.db, project.id).await?;

    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        let image_count = db::inferences::count_images_in_room(&state.db, room.id).await?;
        summaries.push(RoomSummary {
            room_id: room.id,
            name: room.name,
            image_count,
            created_at: room.created_at,
        });
    }

    Ok(Json(summaries))
}

/// Build room routes
pub fn room_routes() -> Router<AppState> {
    Router::new().route("/api/projects/:project_id/rooms", get(list_rooms))
}
