//! Database initialization
//!
//! Opens (or creates) the SQLite database and applies the schema. Table
//! creation is idempotent (`CREATE TABLE IF NOT EXISTS`), so startup is
//! safe against concurrent service instances pointed at the same file.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL allows concurrent readers with one writer; upload requests
    // interleave row inserts with reads from listing endpoints. The
    // options apply to every connection the pool opens.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_all_tables(&pool).await?;

    Ok(pool)
}

/// Create the full schema (idempotent; also used by tests against
/// in-memory or temporary databases)
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_organizations_table(pool).await?;
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_projects_table(pool).await?;
    create_rooms_table(pool).await?;
    create_images_table(pool).await?;
    create_inferences_table(pool).await?;
    Ok(())
}

pub async fn create_organizations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            subscription_status TEXT NOT NULL DEFAULT 'trialing',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            email TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id),
            expires_at TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            org_id TEXT NOT NULL REFERENCES organizations(id),
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            client_name TEXT,
            location TEXT,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_rooms_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rooms (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            name TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // A project cannot have two live rooms with the same name. The
    // partial index makes get-or-create race-free: concurrent first-time
    // resolves collapse onto a single row.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_rooms_project_name
        ON rooms (project_id, name) WHERE is_deleted = 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_images_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id),
            storage_key TEXT NOT NULL,
            content_type TEXT,
            byte_size INTEGER,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_images_project
        ON images (project_id) WHERE is_deleted = 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_inferences_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inferences (
            id TEXT PRIMARY KEY,
            image_id TEXT NOT NULL REFERENCES images(id),
            room_id TEXT NOT NULL REFERENCES rooms(id),
            project_id TEXT NOT NULL REFERENCES projects(id),
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_inferences_image
        ON inferences (image_id) WHERE is_deleted = 0
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_all_tables(&pool).await.unwrap();
        create_all_tables(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn room_name_unique_among_live_rows() {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        create_all_tables(&pool).await.unwrap();

        sqlx::query("INSERT INTO organizations (id, name) VALUES ('o1', 'Acme Restoration')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO projects (id, org_id, name) VALUES ('p1', 'o1', 'Flood Job')")
            .execute(&pool)
            .await
            .unwrap();

        sqlx::query("INSERT INTO rooms (id, project_id, name) VALUES ('r1', 'p1', 'Kitchen')")
            .execute(&pool)
            .await
            .unwrap();

        // Duplicate live name is rejected
        let dup = sqlx::query("INSERT INTO rooms (id, project_id, name) VALUES ('r2', 'p1', 'Kitchen')")
            .execute(&pool)
            .await;
        assert!(dup.is_err());

        // Soft-deleting the original frees the name
        sqlx::query("UPDATE rooms SET is_deleted = 1 WHERE id = 'r1'")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO rooms (id, project_id, name) VALUES ('r3', 'p1', 'Kitchen')")
            .execute(&pool)
            .await
            .unwrap();
    }
}
