//! Image upload endpoint
//!
//! `POST /api/projects/:project_id/images?room=<id|name|"automatic">`
//! accepts a multipart body with one file field and runs the upload
//! pipeline. The response is camelCase to match the documented client
//! contract.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth,
    error::{ApiError, ApiResult},
    AppState,
};

/// Query parameters for the upload endpoint
#[derive(Debug, Deserialize, Default)]
pub struct UploadQuery {
    /// Target room: a room id, a room name, or "automatic"
    pub room: Option<String>,
}

/// Successful upload payload
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub signed_url: Option<String>,
    pub image_key: String,
    pub image_id: Uuid,
    pub inference_id: Uuid,
    pub room_id: Uuid,
    pub room_name: String,
    pub did_create_room: bool,
    pub created_at: DateTime<Utc>,
}

/// POST /api/projects/:project_id/images
pub async fn upload_image(
    State(state): State<AppState>,
    Path(project_id): Path<Uuid>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let auth = auth::authenticate(&state.db, &headers).await?;

    // First file field wins; a body without one is a bad upload
    let mut file: Option<(String, Option<String>, bytes::Bytes)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("unreadable multipart body: {}", e)))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("unreadable file field: {}", e)))?;
        file = Some((filename, content_type, data));
        break;
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| ApiError::BadRequest("no file in multipart body".to_string()))?;

    if data.is_empty() {
        return Err(ApiError::BadRequest("empty file".to_string()));
    }
    if data.len() > state.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file exceeds maximum upload size ({} bytes)",
            state.max_upload_bytes
        )));
    }

    let outcome = state
        .pipeline
        .ingest(
            &auth,
            project_id,
            query.room.as_deref(),
            &filename,
            content_type.as_deref(),
            data,
        )
        .await?;

    Ok(Json(UploadResponse {
        signed_url: outcome.signed_url,
        image_key: outcome.image.storage_key.clone(),
        image_id: outcome.image.id,
        inference_id: outcome.inference_id,
        room_id: outcome.room.id,
        room_name: outcome.room.name,
        did_create_room: outcome.did_create_room,
        created_at: outcome.image.created_at,
    }))
}
