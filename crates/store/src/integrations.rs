use {courier_common::Platform, sqlx::SqlitePool};

use crate::{
    Result,
    models::{Integration, IntegrationRow},
};

/// Per-(owner, platform) provider credentials.
#[derive(Clone)]
pub struct IntegrationStore {
    pool: SqlitePool,
}

impl IntegrationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, owner_id: &str, platform: Platform) -> Result<Option<Integration>> {
        let row = sqlx::query_as::<_, IntegrationRow>(
            "SELECT owner_id, platform, credentials, active, verified, updated_at \
             FROM integrations WHERE owner_id = ? AND platform = ?",
        )
        .bind(owner_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn upsert(&self, integration: &Integration) -> Result<()> {
        let credentials = serde_json::to_string(&integration.credentials)?;
        sqlx::query(
            "INSERT INTO integrations (owner_id, platform, credentials, active, verified, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(owner_id, platform) DO UPDATE SET credentials = excluded.credentials, \
             active = excluded.active, verified = excluded.verified, updated_at = excluded.updated_at",
        )
        .bind(&integration.owner_id)
        .bind(integration.platform.as_str())
        .bind(&credentials)
        .bind(integration.active)
        .bind(integration.verified)
        .bind(integration.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
