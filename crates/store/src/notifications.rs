use {
    async_trait::async_trait,
    courier_common::{Notification, NotificationSink, time::now_ms},
    serde::Serialize,
    sqlx::SqlitePool,
    tracing::warn,
};

use crate::Result;

/// Stored notification as shown in the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredNotification {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    pub message: String,
    pub kind: String,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: i64,
}

/// Notification sink writing to the `notifications` table.
#[derive(Clone)]
pub struct SqliteNotificationSink {
    pool: SqlitePool,
}

impl SqliteNotificationSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert(&self, n: &Notification) -> Result<()> {
        sqlx::query(
            "INSERT INTO notifications (owner_id, title, message, kind, link, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&n.owner_id)
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.kind.as_str())
        .bind(&n.link)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<StoredNotification>> {
        Ok(sqlx::query_as::<_, StoredNotification>(
            "SELECT id, owner_id, title, message, kind, link, read, created_at FROM notifications \
             WHERE owner_id = ? ORDER BY id DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl NotificationSink for SqliteNotificationSink {
    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.insert(&notification).await {
            warn!(owner_id = %notification.owner_id, error = %e, "failed to store notification");
        }
    }
}
