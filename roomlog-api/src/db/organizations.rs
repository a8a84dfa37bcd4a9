//! Organization persistence and subscription standing
//!
//! The subscription status gates uploads: a `past_due` organization is
//! refused before any bytes or rows are written.

use roomlog_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Subscription standing reported by the billing provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "active" => Ok(SubscriptionStatus::Active),
            "trialing" => Ok(SubscriptionStatus::Trialing),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            other => Err(Error::Internal(format!(
                "unknown subscription status in database: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub subscription_status: SubscriptionStatus,
}

/// Insert a new organization
pub async fn create_organization(
    pool: &SqlitePool,
    name: &str,
    status: SubscriptionStatus,
) -> Result<Organization> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO organizations (id, name, subscription_status) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(status.as_str())
        .execute(pool)
        .await?;

    Ok(Organization {
        id,
        name: name.to_string(),
        subscription_status: status,
    })
}

/// Look up an organization's subscription standing
pub async fn subscription_status(pool: &SqlitePool, org_id: Uuid) -> Result<SubscriptionStatus> {
    let row = sqlx::query("SELECT subscription_status FROM organizations WHERE id = ?")
        .bind(org_id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("organization: {}", org_id)))?;

    SubscriptionStatus::parse(row.get::<String, _>("subscription_status").as_str())
}

/// Update subscription standing (driven by the billing provider)
pub async fn set_subscription_status(
    pool: &SqlitePool,
    org_id: Uuid,
    status: SubscriptionStatus,
) -> Result<()> {
    sqlx::query(
        "UPDATE organizations SET subscription_status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(org_id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        roomlog_common::db::init::create_organizations_table(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn status_round_trip() {
        let pool = setup_test_db().await;
        let org = create_organization(&pool, "Acme Restoration", SubscriptionStatus::Active)
            .await
            .unwrap();

        let status = subscription_status(&pool, org.id).await.unwrap();
        assert_eq!(status, SubscriptionStatus::Active);

        set_subscription_status(&pool, org.id, SubscriptionStatus::PastDue)
            .await
            .unwrap();
        let status = subscription_status(&pool, org.id).await.unwrap();
        assert_eq!(status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn unknown_org_is_not_found() {
        let pool = setup_test_db().await;
        let err = subscription_status(&pool, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
