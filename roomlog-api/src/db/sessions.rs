//! User and session persistence backing bearer-token authentication
//!
//! The identity contract the handlers rely on: a token resolves to a
//! user id plus the organization the user belongs to, or nothing.

use chrono::{DateTime, Duration, Utc};
use roomlog_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::projects::parse_uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
}

/// Insert a new user in an organization
pub async fn create_user(pool: &SqlitePool, org_id: Uuid, email: &str) -> Result<User> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, org_id, email) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(org_id.to_string())
        .bind(email)
        .execute(pool)
        .await?;

    Ok(User {
        id,
        org_id,
        email: email.to_string(),
    })
}

/// Create a session for a user, valid for `ttl_hours`
pub async fn create_session(
    pool: &SqlitePool,
    user_id: Uuid,
    token: &str,
    ttl_hours: i64,
) -> Result<()> {
    let expires_at = Utc::now() + Duration::hours(ttl_hours);
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(token)
        .bind(user_id.to_string())
        .bind(expires_at.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(())
}

/// Resolve a bearer token to its user and organization. Expired or
/// unknown tokens resolve to `None`.
pub async fn resolve_token(pool: &SqlitePool, token: &str) -> Result<Option<(Uuid, Uuid)>> {
    let row = sqlx::query(
        r#"
        SELECT s.user_id, s.expires_at, u.org_id
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = ?
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let expires_str: String = row.get("expires_at");
    let expires_at = DateTime::parse_from_rfc3339(&expires_str)
        .map_err(|e| roomlog_common::Error::Internal(format!("bad session expiry: {}", e)))?
        .with_timezone(&Utc);
    if expires_at < Utc::now() {
        return Ok(None);
    }

    let user_id = parse_uuid(row.get("user_id"))?;
    let org_id = parse_uuid(row.get("org_id"))?;
    Ok(Some((user_id, org_id)))
}
