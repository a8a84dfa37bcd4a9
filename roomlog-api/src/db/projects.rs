//! Project persistence

use chrono::{DateTime, Utc};
use roomlog_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub status: String,
    pub client_name: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn project_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Project> {
    Ok(Project {
        id: parse_uuid(row.get("id"))?,
        org_id: parse_uuid(row.get("org_id"))?,
        name: row.get("name"),
        status: row.get("status"),
        client_name: row.get("client_name"),
        location: row.get("location"),
        created_at: row.get("created_at"),
    })
}

pub(crate) fn parse_uuid(value: String) -> Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| roomlog_common::Error::Internal(format!("invalid UUID in database: {}", e)))
}

/// Insert a new project for an organization
pub async fn create_project(pool: &SqlitePool, org_id: Uuid, name: &str) -> Result<Project> {
    let id = Uuid::new_v4();
    let row = sqlx::query(
        r#"
        INSERT INTO projects (id, org_id, name)
        VALUES (?, ?, ?)
        RETURNING id, org_id, name, status, client_name, location, created_at
        "#,
    )
    .bind(id.to_string())
    .bind(org_id.to_string())
    .bind(name)
    .fetch_one(pool)
    .await?;

    project_from_row(&row)
}

/// Load a non-deleted project scoped to the caller's organization.
/// A project outside the organization is indistinguishable from a
/// missing one.
pub async fn find_for_org(
    pool: &SqlitePool,
    org_id: Uuid,
    project_id: Uuid,
) -> Result<Option<Project>> {
    let row = sqlx::query(
        r#"
        SELECT id, org_id, name, status, client_name, location, created_at
        FROM projects
        WHERE id = ? AND org_id = ? AND is_deleted = 0
        "#,
    )
    .bind(project_id.to_string())
    .bind(org_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(project_from_row).transpose()
}
