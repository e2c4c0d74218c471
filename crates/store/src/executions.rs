//! Idempotency records for recurring trigger runs.

use {sqlx::SqlitePool, tracing::warn};

use crate::{
    Result,
    models::{AutomationExecution, AutomationKind, ExecutionRow, ExecutionStatus},
};

/// A `processing` run older than this is treated as abandoned.
pub const STALE_RUN_MS: i64 = 60 * 60 * 1000;

const COLUMNS: &str =
    "id, kind, day, status, processed, enqueued, skipped, error, started_at, finished_at";

/// Counts written when a run finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionCounts {
    pub processed: u64,
    pub enqueued: u64,
    pub skipped: u64,
}

fn as_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[derive(Clone)]
pub struct ExecutionStore {
    pool: SqlitePool,
}

impl ExecutionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The completed run for `(kind, day)`, if any.
    pub async fn find_completed(
        &self,
        kind: AutomationKind,
        day: &str,
    ) -> Result<Option<AutomationExecution>> {
        let row = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {COLUMNS} FROM automation_executions \
             WHERE kind = ? AND day = ? AND status = 'completed'"
        ))
        .bind(kind.as_str())
        .bind(day)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Claim `(kind, day)` with a `processing` run and return its id.
    ///
    /// Returns `None` while another run holds the day, either still running
    /// or completed. A `processing` run older than [`STALE_RUN_MS`] is marked
    /// failed first so a crashed run does not block the day.
    pub async fn start(&self, kind: AutomationKind, day: &str, now: i64) -> Result<Option<String>> {
        let abandoned = sqlx::query(
            "UPDATE automation_executions SET status = 'failed', error = 'abandoned', \
             finished_at = ? WHERE kind = ? AND day = ? AND status = 'processing' \
             AND started_at < ?",
        )
        .bind(now)
        .bind(kind.as_str())
        .bind(day)
        .bind(now - STALE_RUN_MS)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if abandoned > 0 {
            warn!(kind = kind.as_str(), day, "abandoned run released");
        }

        let id = uuid::Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            "INSERT INTO automation_executions (id, kind, day, status, started_at) \
             VALUES (?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(&id)
        .bind(kind.as_str())
        .bind(day)
        .bind(ExecutionStatus::Processing.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok((inserted > 0).then_some(id))
    }

    /// Mark a claimed run completed.
    pub async fn complete(&self, id: &str, counts: ExecutionCounts, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE automation_executions SET status = 'completed', processed = ?, \
             enqueued = ?, skipped = ?, finished_at = ? WHERE id = ?",
        )
        .bind(as_i64(counts.processed))
        .bind(as_i64(counts.enqueued))
        .bind(as_i64(counts.skipped))
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail(&self, id: &str, error: &str, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE automation_executions SET status = 'failed', error = ?, finished_at = ? \
             WHERE id = ?",
        )
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_day(&self, day: &str) -> Result<Vec<AutomationExecution>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {COLUMNS} FROM automation_executions WHERE day = ? ORDER BY started_at ASC"
        ))
        .bind(day)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn count_for_day(&self, day: &str) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM automation_executions WHERE day = ?")
                .bind(day)
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::testing::memory_pool};

    #[tokio::test]
    async fn completed_run_is_found_once_per_day() {
        let store = ExecutionStore::new(memory_pool().await);
        let kind = AutomationKind::Birthday;
        assert!(store.find_completed(kind, "2026-03-01").await.unwrap().is_none());

        let id = store.start(kind, "2026-03-01", 10).await.unwrap().unwrap();
        assert!(store.find_completed(kind, "2026-03-01").await.unwrap().is_none());

        let counts = ExecutionCounts {
            processed: 4,
            enqueued: 3,
            skipped: 1,
        };
        store.complete(&id, counts, 20).await.unwrap();
        let done = store.find_completed(kind, "2026-03-01").await.unwrap().unwrap();
        assert_eq!(done.enqueued, 3);
        assert_eq!(done.finished_at, Some(20));
        assert!(
            store
                .find_completed(AutomationKind::InactiveClient, "2026-03-01")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn day_is_claimed_by_one_run() {
        let store = ExecutionStore::new(memory_pool().await);
        let kind = AutomationKind::InactiveClient;
        let a = store.start(kind, "2026-03-01", 0).await.unwrap().unwrap();
        assert!(store.start(kind, "2026-03-01", 5).await.unwrap().is_none());

        // A failed run frees the day for a retry.
        store.fail(&a, "boom", 10).await.unwrap();
        let b = store.start(kind, "2026-03-01", 20).await.unwrap().unwrap();
        store.complete(&b, ExecutionCounts::default(), 30).await.unwrap();
        assert!(store.start(kind, "2026-03-01", 40).await.unwrap().is_none());

        let runs = store.list_for_day("2026-03-01").await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(store.count_for_day("2026-03-01").await.unwrap(), 2);
        assert_eq!(store.count_for_day("2026-03-02").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn abandoned_run_releases_the_day() {
        let store = ExecutionStore::new(memory_pool().await);
        let kind = AutomationKind::Birthday;
        let stuck = store.start(kind, "2026-03-01", 0).await.unwrap().unwrap();
        assert!(store.start(kind, "2026-03-01", STALE_RUN_MS - 1).await.unwrap().is_none());

        let fresh = store.start(kind, "2026-03-01", STALE_RUN_MS + 1).await.unwrap();
        assert!(fresh.is_some());
        let runs = store.list_for_day("2026-03-01").await.unwrap();
        let old = runs.iter().find(|r| r.id == stuck).unwrap();
        assert_eq!(old.status, ExecutionStatus::Failed);
        assert_eq!(old.error.as_deref(), Some("abandoned"));
    }
}
