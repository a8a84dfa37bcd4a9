//! Signed file serving
//!
//! `GET /files/*key?expires=...&sig=...` streams a stored object back to
//! anyone holding an unexpired signature for it. No session is required;
//! the signature is the credential.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::{
    db,
    error::{ApiError, ApiResult},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    pub expires: i64,
    pub sig: String,
}

/// GET /files/*key
pub async fn serve_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedUrlQuery>,
) -> ApiResult<Response> {
    // The router hands us the percent-decoded object key, which is what
    // the signature was computed over.
    if !state.signer.verify(&key, query.expires, &query.sig) {
        tracing::warn!(key = %key, "rejected signed URL");
        return Err(ApiError::Forbidden(
            "signature invalid or expired".to_string(),
        ));
    }

    let data = state.storage.get(&key).await?;

    // Content type comes from the image row; the stored key is the
    // percent-encoded form.
    let encoded_key = urlencoding::encode(&key).into_owned();
    let content_type = db::images::find_by_storage_key(&state.db, &encoded_key)
        .await?
        .and_then(|image| image.content_type)
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=1800".to_string()),
        ],
        data,
    )
        .into_response())
}

/// Build file serving routes
pub fn file_routes() -> Router<AppState> {
    Router::new().route("/files/*key", get(serve_file))
}
