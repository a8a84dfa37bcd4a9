//! Image persistence
//!
//! An image row records the percent-encoded storage key of the uploaded
//! object. Images have no intrinsic room association; that link lives in
//! the inferences table.

use chrono::{DateTime, Utc};
use roomlog_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::projects::parse_uuid;

#[derive(Debug, Clone)]
pub struct Image {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Percent-encoded object key; decode before handing to storage
    pub storage_key: String,
    pub content_type: Option<String>,
    pub byte_size: Option<i64>,
    pub created_at: DateTime<Utc>,
}

fn image_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Image> {
    Ok(Image {
        id: parse_uuid(row.get("id"))?,
        project_id: parse_uuid(row.get("project_id"))?,
        storage_key: row.get("storage_key"),
        content_type: row.get("content_type"),
        byte_size: row.get("byte_size"),
        created_at: row.get("created_at"),
    })
}

/// Register an uploaded image against a project. Fails with `NotFound`
/// if the project does not exist or is deleted.
pub async fn insert_image(
    pool: &SqlitePool,
    project_id: Uuid,
    storage_key: &str,
    content_type: Option<&str>,
    byte_size: i64,
) -> Result<Image> {
    let exists: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM projects WHERE id = ? AND is_deleted = 0")
            .bind(project_id.to_string())
            .fetch_optional(pool)
            .await?;
    if exists.is_none() {
        return Err(Error::NotFound(format!("project: {}", project_id)));
    }

    let id = Uuid::new_v4();
    let row = sqlx::query(
        r#"
        INSERT INTO images (id, project_id, storage_key, content_type, byte_size)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, project_id, storage_key, content_type, byte_size, created_at
        "#,
    )
    .bind(id.to_string())
    .bind(project_id.to_string())
    .bind(storage_key)
    .bind(content_type)
    .bind(byte_size)
    .fetch_one(pool)
    .await?;

    image_from_row(&row)
}

/// Load a live image by id
pub async fn find_by_id(pool: &SqlitePool, image_id: Uuid) -> Result<Option<Image>> {
    let row = sqlx::query(
        r#"
        SELECT id, project_id, storage_key, content_type, byte_size, created_at
        FROM images
        WHERE id = ? AND is_deleted = 0
        "#,
    )
    .bind(image_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(image_from_row).transpose()
}

/// Load a live image by its stored (percent-encoded) key
pub async fn find_by_storage_key(pool: &SqlitePool, storage_key: &str) -> Result<Option<Image>> {
    let row = sqlx::query(
        r#"
        SELECT id, project_id, storage_key, content_type, byte_size, created_at
        FROM images
        WHERE storage_key = ? AND is_deleted = 0
        "#,
    )
    .bind(storage_key)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(image_from_row).transpose()
}

/// All live images of a project, newest first
pub async fn list_for_project(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Image>> {
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, storage_key, content_type, byte_size, created_at
        FROM images
        WHERE project_id = ? AND is_deleted = 0
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(image_from_row).collect()
}

/// Mark an image deleted. Returns the number of rows touched (0 when
/// the image was already gone).
pub async fn soft_delete(pool: &SqlitePool, image_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE images SET is_deleted = 1, updated_at = CURRENT_TIMESTAMP WHERE id = ? AND is_deleted = 0",
    )
    .bind(image_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
