//! Durable outbound queue.

use std::collections::BTreeMap;

use {
    sqlx::{QueryBuilder, Sqlite, SqlitePool},
    tracing::debug,
};

use crate::{
    Result,
    models::{MessageStatus, NewScheduledMessage, ScheduledMessage, ScheduledMessageRow},
};

const COLUMNS: &str = "id, owner_id, automation_id, client_id, bot_id, platform, recipient, \
                       content, metadata, scheduled_for, priority, status, retry_count, \
                       last_error, provider_message_id, claimed_at, last_attempt_at, sent_at, \
                       created_at, updated_at";

/// Rows per multi-value INSERT; keeps the bind count under SQLite's limit.
const MAX_ROWS_PER_INSERT: usize = 100;

/// Filter describing which rows a Queue Processor invocation may dispatch.
#[derive(Debug, Clone, Copy)]
pub struct Eligibility<'a> {
    pub now: i64,
    pub max_retries: u32,
    pub owner_id: Option<&'a str>,
    /// Rows attempted at or after this instant are skipped.
    pub attempted_before: Option<i64>,
}

impl<'a> Eligibility<'a> {
    #[must_use]
    pub fn at(now: i64, max_retries: u32) -> Self {
        Self {
            now,
            max_retries,
            owner_id: None,
            attempted_before: None,
        }
    }

    #[must_use]
    pub fn owner(mut self, owner_id: Option<&'a str>) -> Self {
        self.owner_id = owner_id;
        self
    }

    #[must_use]
    pub fn attempted_before(mut self, instant: i64) -> Self {
        self.attempted_before = Some(instant);
        self
    }

    fn push_predicate(&self, qb: &mut QueryBuilder<'a, Sqlite>) {
        qb.push(" status IN ('pending', 'failed') AND retry_count < ")
            .push_bind(i64::from(self.max_retries))
            .push(" AND scheduled_for <= ")
            .push_bind(self.now);
        if let Some(owner) = self.owner_id {
            qb.push(" AND owner_id = ").push_bind(owner);
        }
        if let Some(before) = self.attempted_before {
            qb.push(" AND (last_attempt_at IS NULL OR last_attempt_at < ")
                .push_bind(before)
                .push(")");
        }
    }
}

/// SQLite-backed scheduled message queue.
#[derive(Clone)]
pub struct ScheduledMessageStore {
    pool: SqlitePool,
}

impl ScheduledMessageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Enqueue one message and return its id.
    pub async fn insert(&self, msg: &NewScheduledMessage, now: i64) -> Result<String> {
        let ids = self.insert_batch(std::slice::from_ref(msg), now).await?;
        Ok(ids.into_iter().next().unwrap_or_default())
    }

    /// Enqueue many messages in one transaction. Returns ids in input order.
    pub async fn insert_batch(&self, msgs: &[NewScheduledMessage], now: i64) -> Result<Vec<String>> {
        if msgs.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::with_capacity(msgs.len());
        for msg in msgs {
            rows.push((
                uuid::Uuid::new_v4().to_string(),
                serde_json::to_string(&msg.metadata)?,
                msg,
            ));
        }

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(MAX_ROWS_PER_INSERT) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO scheduled_messages (id, owner_id, automation_id, client_id, bot_id, \
                 platform, recipient, content, metadata, scheduled_for, priority, status, \
                 retry_count, created_at, updated_at) ",
            );
            qb.push_values(chunk, |mut b, (id, metadata, msg)| {
                b.push_bind(id)
                    .push_bind(&msg.owner_id)
                    .push_bind(&msg.automation_id)
                    .push_bind(&msg.client_id)
                    .push_bind(&msg.bot_id)
                    .push_bind(msg.platform.as_str())
                    .push_bind(&msg.recipient)
                    .push_bind(&msg.content)
                    .push_bind(metadata)
                    .push_bind(msg.scheduled_for)
                    .push_bind(msg.priority)
                    .push_bind(MessageStatus::Pending.as_str())
                    .push_bind(0_i64)
                    .push_bind(now)
                    .push_bind(now);
            });
            qb.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(count = rows.len(), "enqueued scheduled messages");
        Ok(rows.into_iter().map(|(id, ..)| id).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<ScheduledMessage>> {
        let row = sqlx::query_as::<_, ScheduledMessageRow>(&format!(
            "SELECT {COLUMNS} FROM scheduled_messages WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ScheduledMessage>> {
        let rows = sqlx::query_as::<_, ScheduledMessageRow>(&format!(
            "SELECT {COLUMNS} FROM scheduled_messages WHERE owner_id = ? \
             ORDER BY scheduled_for ASC, id ASC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Eligible rows ordered by priority then due time.
    pub async fn fetch_due(
        &self,
        filter: Eligibility<'_>,
        limit: u32,
    ) -> Result<Vec<ScheduledMessage>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {COLUMNS} FROM scheduled_messages WHERE"
        ));
        filter.push_predicate(&mut qb);
        qb.push(" ORDER BY priority ASC, scheduled_for ASC, id ASC LIMIT ")
            .push_bind(i64::from(limit));

        let rows = qb
            .build_query_as::<ScheduledMessageRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Atomically move still-eligible rows among `ids` to `processing`.
    ///
    /// Only rows this call actually flipped are returned; a row claimed by a
    /// concurrent invocation in the meantime is left out.
    pub async fn claim(
        &self,
        ids: &[String],
        filter: Eligibility<'_>,
    ) -> Result<Vec<ScheduledMessage>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let token = uuid::Uuid::new_v4().to_string();

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE scheduled_messages SET status = ");
        qb.push_bind(MessageStatus::Processing.as_str())
            .push(", claim_token = ")
            .push_bind(&token)
            .push(", claimed_at = ")
            .push_bind(filter.now)
            .push(" WHERE claim_token IS NULL AND");
        filter.push_predicate(&mut qb);
        qb.push(" AND id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id);
        }
        sep.push_unseparated(")");
        qb.build().execute(&self.pool).await?;

        let rows = sqlx::query_as::<_, ScheduledMessageRow>(&format!(
            "SELECT {COLUMNS} FROM scheduled_messages WHERE claim_token = ? \
             ORDER BY priority ASC, scheduled_for ASC, id ASC"
        ))
        .bind(&token)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    pub async fn mark_sent(
        &self,
        id: &str,
        provider_message_id: Option<&str>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_messages SET status = 'sent', provider_message_id = ?, \
             last_error = NULL, sent_at = ?, last_attempt_at = ?, updated_at = ?, \
             claim_token = NULL, claimed_at = NULL WHERE id = ?",
        )
        .bind(provider_message_id)
        .bind(now)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed attempt with the retry count chosen by the caller.
    pub async fn mark_failed(&self, id: &str, retry_count: u32, error: &str, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_messages SET status = 'failed', retry_count = ?, last_error = ?, \
             last_attempt_at = ?, updated_at = ?, claim_token = NULL, claimed_at = NULL \
             WHERE id = ?",
        )
        .bind(i64::from(retry_count))
        .bind(error)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Return rows claimed before `claimed_before` and never finished to `pending`.
    pub async fn release_stale_claims(&self, claimed_before: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE scheduled_messages SET status = 'pending', claim_token = NULL, \
             claimed_at = NULL WHERE status = 'processing' AND claimed_at < ?",
        )
        .bind(claimed_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Fresh count of rows matching the eligibility predicate.
    pub async fn count_eligible(&self, filter: Eligibility<'_>) -> Result<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM scheduled_messages WHERE");
        filter.push_predicate(&mut qb);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Row counts per status, with every status present.
    pub async fn count_by_status(&self) -> Result<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM scheduled_messages GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut counts: BTreeMap<String, u64> = [
            MessageStatus::Pending,
            MessageStatus::Processing,
            MessageStatus::Sent,
            MessageStatus::Failed,
        ]
        .into_iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
        for (status, count) in rows {
            counts.insert(status, u64::try_from(count).unwrap_or_default());
        }
        Ok(counts)
    }

    /// Messages due and still pending, across all owners.
    pub async fn count_pending(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM scheduled_messages WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
