//! Immutable audit trail and usage accounting.

use {
    courier_common::Platform,
    sqlx::{QueryBuilder, Sqlite, SqlitePool},
};

use crate::{
    Result,
    models::{AuditEntry, AuditRecord},
};

/// Usage kind recorded for every successful outbound dispatch.
pub const USAGE_AUTOMATION_MESSAGE: &str = "automation_message";
/// Usage kind recorded for every automated reply to an inbound message.
pub const USAGE_AUTO_REPLY: &str = "auto_reply";

#[derive(Clone)]
pub struct AuditLog {
    pool: SqlitePool,
}

impl AuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: &AuditEntry, now: i64) -> Result<()> {
        self.record_batch(std::slice::from_ref(entry), now).await
    }

    /// Insert many entries in one statement.
    pub async fn record_batch(&self, entries: &[AuditEntry], now: i64) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "INSERT INTO automation_logs (owner_id, automation_id, scheduled_message_id, \
             client_id, platform, status, recipient, provider_message_id, error, created_at) ",
        );
        qb.push_values(entries, |mut b, e| {
            b.push_bind(&e.owner_id)
                .push_bind(&e.automation_id)
                .push_bind(&e.scheduled_message_id)
                .push_bind(&e.client_id)
                .push_bind(e.platform.as_str())
                .push_bind(e.status.as_str())
                .push_bind(&e.recipient)
                .push_bind(&e.provider_message_id)
                .push_bind(&e.error)
                .push_bind(now);
        });
        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    pub async fn list_for_message(&self, scheduled_message_id: &str) -> Result<Vec<AuditRecord>> {
        Ok(sqlx::query_as::<_, AuditRecord>(
            "SELECT id, owner_id, automation_id, scheduled_message_id, client_id, platform, status, \
             recipient, provider_message_id, error, created_at FROM automation_logs \
             WHERE scheduled_message_id = ? ORDER BY id ASC",
        )
        .bind(scheduled_message_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn list_for_automation(&self, automation_id: &str) -> Result<Vec<AuditRecord>> {
        Ok(sqlx::query_as::<_, AuditRecord>(
            "SELECT id, owner_id, automation_id, scheduled_message_id, client_id, platform, status, \
             recipient, provider_message_id, error, created_at FROM automation_logs \
             WHERE automation_id = ? ORDER BY id ASC",
        )
        .bind(automation_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn record_usage(
        &self,
        owner_id: &str,
        kind: &str,
        platform: Platform,
        scheduled_message_id: Option<&str>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO usage_events (owner_id, kind, platform, scheduled_message_id, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(owner_id)
        .bind(kind)
        .bind(platform.as_str())
        .bind(scheduled_message_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_usage(&self, owner_id: &str, kind: &str) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM usage_events WHERE owner_id = ? AND kind = ?")
                .bind(owner_id)
                .bind(kind)
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{models::LogStatus, testing::memory_pool},
    };

    fn entry(message_id: &str, status: LogStatus) -> AuditEntry {
        AuditEntry {
            owner_id: "o1".into(),
            automation_id: Some("a1".into()),
            scheduled_message_id: Some(message_id.into()),
            client_id: None,
            platform: Platform::Email,
            status,
            recipient: Some("ana@example.com".into()),
            provider_message_id: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn entries_are_listed_in_insertion_order() {
        let log = AuditLog::new(memory_pool().await);
        log.record_batch(&[entry("m1", LogStatus::Queued), entry("m2", LogStatus::Queued)], 1)
            .await
            .unwrap();
        log.record(
            &AuditEntry {
                error: Some("smtp 550".into()),
                ..entry("m1", LogStatus::Failed)
            },
            2,
        )
        .await
        .unwrap();

        let rows = log.list_for_message("m1").await.unwrap();
        let statuses: Vec<_> = rows.iter().map(|r| r.status.as_str()).collect();
        assert_eq!(statuses, vec!["queued", "failed"]);
        assert_eq!(rows[1].error.as_deref(), Some("smtp 550"));
        assert_eq!(log.list_for_automation("a1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn usage_is_counted_per_kind() {
        let log = AuditLog::new(memory_pool().await);
        log.record_usage("o1", USAGE_AUTOMATION_MESSAGE, Platform::Whatsapp, Some("m1"), 1)
            .await
            .unwrap();
        log.record_usage("o1", USAGE_AUTO_REPLY, Platform::Whatsapp, None, 2)
            .await
            .unwrap();
        assert_eq!(log.count_usage("o1", USAGE_AUTOMATION_MESSAGE).await.unwrap(), 1);
        assert_eq!(log.count_usage("o2", USAGE_AUTO_REPLY).await.unwrap(), 0);
    }
}
