//! SQLite persistence for the outbound queue, conversation history, audit
//! trail and the business data the trigger generators read.

pub mod audit;
pub mod business;
pub mod conversations;
pub mod error;
pub mod executions;
pub mod integrations;
pub mod models;
pub mod notifications;
pub mod scheduled;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};

pub use {
    audit::AuditLog,
    business::BusinessStore,
    conversations::{ConversationKey, ConversationStore, Resolved},
    error::{Error, Result},
    executions::{ExecutionCounts, ExecutionStore},
    integrations::IntegrationStore,
    notifications::SqliteNotificationSink,
    scheduled::{Eligibility, ScheduledMessageStore},
};

/// Run the embedded migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Open a pool for `url` and bring the schema up to date.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect(url)
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Migrated in-memory database on a single long-lived connection.
///
/// Every SQLite `:memory:` connection is its own database, so the pool must
/// never open a second one.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Every store over one shared pool.
#[derive(Clone)]
pub struct Stores {
    pub pool: SqlitePool,
    pub scheduled: ScheduledMessageStore,
    pub executions: ExecutionStore,
    pub integrations: IntegrationStore,
    pub conversations: ConversationStore,
    pub business: BusinessStore,
    pub audit: AuditLog,
    pub notifications: SqliteNotificationSink,
}

impl Stores {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            scheduled: ScheduledMessageStore::new(pool.clone()),
            executions: ExecutionStore::new(pool.clone()),
            integrations: IntegrationStore::new(pool.clone()),
            conversations: ConversationStore::new(pool.clone()),
            business: BusinessStore::new(pool.clone()),
            audit: AuditLog::new(pool.clone()),
            notifications: SqliteNotificationSink::new(pool.clone()),
            pool,
        }
    }
}


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_in_memory().await.unwrap();
        run_migrations(&pool).await.unwrap();
        let stores = Stores::new(pool);
        assert_eq!(stores.scheduled.count_pending().await.unwrap(), 0);
    }
}
