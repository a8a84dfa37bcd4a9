//! Bearer-token authentication
//!
//! Handlers call [`authenticate`] with the request headers; the token is
//! resolved against the sessions table into the caller's user and
//! organization ids.

use axum::http::{header, HeaderMap};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ApiError;

/// Resolved caller identity
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub org_id: Uuid,
}

/// Resolve the caller from an `Authorization: Bearer <token>` header.
pub async fn authenticate(pool: &SqlitePool, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

    let resolved = crate::db::sessions::resolve_token(pool, token)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "session lookup failed");
            ApiError::Persistence(e.to_string())
        })?;

    match resolved {
        Some((user_id, org_id)) => Ok(AuthContext { user_id, org_id }),
        None => Err(ApiError::Unauthorized("invalid or expired session".to_string())),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(&headers_with("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(&headers_with("Basic abc123")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
