//! Image management endpoints: listing, bulk move-to-room, soft delete

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::SIGNED_URL_TTL_SECS;
use crate::{
    auth, db,
    error::{ApiError, ApiResult},
    AppState,
};

/// One image in a project listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub image_id: Uuid,
    pub image_key: String,
    /// Freshly minted on every read; None when signing failed
    pub signed_url: Option<String>,
    pub room_id: Option<Uuid>,
    pub room_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /api/projects/:project_id/images
pub async fn list_images(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<ImageSummary>>> {
    let auth = auth::authenticate(&state.db, &headers).await?;

    let project = db::projects::find_for_org(&state.db, auth.org_id, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project: {}", project_id)))?;

    let images = db::images::list_for_project(&state.db, project.id).await?;

    let mut summaries = Vec::with_capacity(images.len());
    for image in images {
        let inference = db::inferences::find_by_image(&state.db, image.id).await?;
        let room = match &inference {
            Some(inf) => db::rooms::find_by_id(&state.db, project.id, inf.room_id).await?,
            None => None,
        };

        let object_key = urlencoding::decode(&image.storage_key)
            .map(|k| k.into_owned())
            .unwrap_or_else(|_| image.storage_key.clone());
        let signed_url = state.signer.sign(&object_key, SIGNED_URL_TTL_SECS);

        summaries.push(ImageSummary {
            image_id: image.id,
            image_key: image.storage_key,
            signed_url,
            room_id: inference.map(|inf| inf.room_id),
            room_name: room.map(|r| r.name),
            created_at: image.created_at,
        });
    }

    Ok(Json(summaries))
}

/// Bulk move request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveImagesRequest {
    pub image_ids: Vec<Uuid>,
    pub room_id: Uuid,
}

/// Bulk move response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveImagesResponse {
    pub moved: u64,
    pub room_id: Uuid,
    pub room_name: String,
}

/// POST /api/projects/:project_id/images/move
pub async fn move_images(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<MoveImagesRequest>,
) -> ApiResult<Json<MoveImagesResponse>> {
    let auth = auth::authenticate(&state.db, &headers).await?;

    let project = db::projects::find_for_org(&state.db, auth.org_id, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project: {}", project_id)))?;

    if request.image_ids.is_empty() {
        return Err(ApiError::BadRequest("imageIds must not be empty".to_string()));
    }

    let room = db::rooms::find_by_id(&state.db, project.id, request.room_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("room: {}", request.room_id)))?;

    let moved =
        db::inferences::move_images_to_room(&state.db, project.id, &request.image_ids, room.id)
            .await?;

    tracing::info!(
        project_id = %project.id,
        room = %room.name,
        moved,
        "bulk image move"
    );

    Ok(Json(MoveImagesResponse {
        moved,
        room_id: room.id,
        room_name: room.name,
    }))
}

/// Soft-delete response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImageResponse {
    pub image_id: Uuid,
    pub deleted: bool,
}

/// DELETE /api/images/:image_id
pub async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
    headers: HeaderMap,
) -> ApiResult<Json<DeleteImageResponse>> {
    let auth = auth::authenticate(&state.db, &headers).await?;

    let image = db::images::find_by_id(&state.db, image_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("image: {}", image_id)))?;

    // Org scoping goes through the owning project
    db::projects::find_for_org(&state.db, auth.org_id, image.project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("image: {}", image_id)))?;

    let deleted = db::images::soft_delete(&state.db, image.id).await? > 0;
    db::inferences::soft_delete_for_image(&state.db, image.id).await?;

    Ok(Json(DeleteImageResponse {
        image_id: image.id,
        deleted,
    }))
}

/// Build image routes (upload shares the collection path)
pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:project_id/images",
            post(super::uploads::upload_image).get(list_images),
        )
        .route("/api/projects/:project_id/images/move", post(move_images))
        .route("/api/images/:image_id", delete(delete_image))
}
