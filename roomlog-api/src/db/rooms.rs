//! Room persistence and idempotent get-or-create
//!
//! Rooms are created lazily the first time a name is seen for a
//! project. The conflict-ignoring insert against the partial unique
//! index makes concurrent first-time resolves collapse onto one row
//! instead of racing into duplicates.

use chrono::{DateTime, Utc};
use roomlog_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::projects::parse_uuid;

#[derive(Debug, Clone)]
pub struct Room {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

fn room_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Room> {
    Ok(Room {
        id: parse_uuid(row.get("id"))?,
        project_id: parse_uuid(row.get("project_id"))?,
        name: row.get("name"),
        created_at: row.get("created_at"),
    })
}

/// Find an existing live room by exact name, or create it.
///
/// Returns the room and whether this call created it. Callers must not
/// pass an empty name; sentinel handling happens upstream.
pub async fn resolve_room(
    pool: &SqlitePool,
    project_id: Uuid,
    name: &str,
) -> Result<(Room, bool)> {
    if name.is_empty() {
        return Err(Error::InvalidInput("room name must not be empty".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO rooms (id, project_id, name)
        VALUES (?, ?, ?)
        ON CONFLICT (project_id, name) WHERE is_deleted = 0 DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(project_id.to_string())
    .bind(name)
    .execute(pool)
    .await?;

    let created = result.rows_affected() == 1;

    let room = find_by_name(pool, project_id, name)
        .await?
        .ok_or_else(|| Error::Internal(format!("room vanished after upsert: {}", name)))?;

    Ok((room, created))
}

/// Exact-name lookup among live rooms of a project
pub async fn find_by_name(
    pool: &SqlitePool,
    project_id: Uuid,
    name: &str,
) -> Result<Option<Room>> {
    let row = sqlx::query(
        r#"
        SELECT id, project_id, name, created_at
        FROM rooms
        WHERE project_id = ? AND name = ? AND is_deleted = 0
        "#,
    )
    .bind(project_id.to_string())
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(room_from_row).transpose()
}

/// Load a live room by id within a project
pub async fn find_by_id(pool: &SqlitePool, project_id: Uuid, room_id: Uuid) -> Result<Option<Room>> {
    let row = sqlx::query(
        r#"
        SELECT id, project_id, name, created_at
        FROM rooms
        WHERE id = ? AND project_id = ? AND is_deleted = 0
        "#,
    )
    .bind(room_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(room_from_row).transpose()
}

/// All live rooms of a project, oldest first
pub async fn list_for_project(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Room>> {
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, name, created_at
        FROM rooms
        WHERE project_id = ? AND is_deleted = 0
        ORDER BY created_at ASC, name ASC
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(room_from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::organizations::{create_organization, SubscriptionStatus};
    use crate::db::projects::create_project;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        roomlog_common::db::init::create_all_tables(&pool).await.unwrap();
        pool
    }

    async fn seed_project(pool: &SqlitePool, name: &str) -> Uuid {
        let org = create_organization(pool, "Acme", SubscriptionStatus::Active)
            .await
            .unwrap();
        create_project(pool, org.id, name).await.unwrap().id
    }

    #[tokio::test]
    async fn first_resolve_creates_second_finds() {
        let pool = setup_test_db().await;
        let project_id = seed_project(&pool, "Flood Job").await;

        let (room, created) = resolve_room(&pool, project_id, "Kitchen").await.unwrap();
        assert!(created);
        assert_eq!(room.name, "Kitchen");

        let (again, created) = resolve_room(&pool, project_id, "Kitchen").await.unwrap();
        assert!(!created);
        assert_eq!(again.id, room.id);
    }

    #[tokio::test]
    async fn same_name_in_other_project_is_a_new_room() {
        let pool = setup_test_db().await;
        let first_project = seed_project(&pool, "Flood Job").await;
        let second_project = seed_project(&pool, "Fire Job").await;

        let (a, _) = resolve_room(&pool, first_project, "Kitchen").await.unwrap();
        let (b, created) = resolve_room(&pool, second_project, "Kitchen").await.unwrap();
        assert!(created);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let pool = setup_test_db().await;
        let err = resolve_room(&pool, Uuid::new_v4(), "").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn lookup_ignores_soft_deleted_rooms() {
        let pool = setup_test_db().await;
        let project_id = seed_project(&pool, "Flood Job").await;

        let (room, _) = resolve_room(&pool, project_id, "Attic").await.unwrap();
        sqlx::query("UPDATE rooms SET is_deleted = 1 WHERE id = ?")
            .bind(room.id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        assert!(find_by_name(&pool, project_id, "Attic").await.unwrap().is_none());

        // Resolving again creates a fresh live row
        let (fresh, created) = resolve_room(&pool, project_id, "Attic").await.unwrap();
        assert!(created);
        assert_ne!(fresh.id, room.id);
    }
}
