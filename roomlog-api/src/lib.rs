//! roomlog-api: photo capture and room grouping service
//!
//! Accepts authenticated photo uploads for restoration projects, writes
//! the bytes to an object store, groups each photo into a room, and
//! hands back time-limited signed URLs for viewing.

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod services;
pub mod storage;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use services::{UploadPipeline, UrlSigner};
use storage::ObjectStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub storage: Arc<dyn ObjectStore>,
    pub signer: UrlSigner,
    pub pipeline: Arc<UploadPipeline>,
    pub max_upload_bytes: usize,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        storage: Arc<dyn ObjectStore>,
        signer: UrlSigner,
        max_upload_bytes: usize,
    ) -> Self {
        let pipeline = Arc::new(UploadPipeline::new(
            db.clone(),
            storage.clone(),
            signer.clone(),
        ));
        Self {
            db,
            storage,
            signer,
            pipeline,
            max_upload_bytes,
            startup_time: Utc::now(),
        }
    }
}

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    // The multipart framing adds overhead on top of the file itself, so
    // the body cap sits above the per-file limit the handler enforces.
    let body_limit = state.max_upload_bytes + 64 * 1024;

    Router::new()
        .merge(api::health_routes())
        .merge(api::image_routes())
        .merge(api::room_routes())
        .merge(api::file_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
