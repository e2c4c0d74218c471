//! Conversation threads and their append-only messages.

use {
    courier_common::{Platform, phone::canonical_phone},
    sqlx::SqlitePool,
    tracing::debug,
};

use crate::{
    Result,
    models::{
        Conversation, ConversationRow, ConversationStatus, Message, MessageRow, NewMessage,
        SenderType,
    },
};

const CONVERSATION_COLUMNS: &str = "id, owner_id, bot_id, platform, counterparty_id, \
                                    display_name, status, paused_until, created_at, updated_at";
const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_type, content, provider_message_id, metadata, created_at";

/// Who a conversation is with, as seen by one bot.
#[derive(Debug, Clone)]
pub struct ConversationKey<'a> {
    pub owner_id: &'a str,
    pub bot_id: &'a str,
    pub platform: Platform,
    pub counterparty_id: &'a str,
}

impl ConversationKey<'_> {
    /// Lookup key shared by every identifier that addresses the same
    /// counterparty on this platform.
    #[must_use]
    pub fn counterparty_key(&self) -> String {
        if self.platform.is_phone_based() {
            let canonical = canonical_phone(self.counterparty_id);
            if !canonical.is_empty() {
                return canonical;
            }
        }
        self.counterparty_id.to_string()
    }
}

/// Result of [`ConversationStore::resolve`].
#[derive(Debug, Clone)]
pub struct Resolved {
    pub conversation: Conversation,
    pub created: bool,
}

#[derive(Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Best existing conversation for `key`: active first, then the most
    /// recently touched paused one.
    pub async fn find(&self, key: &ConversationKey<'_>) -> Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE bot_id = ? AND platform = ? AND counterparty_key = ? \
             ORDER BY CASE status WHEN 'active' THEN 0 ELSE 1 END, updated_at DESC, id ASC LIMIT 1"
        ))
        .bind(key.bot_id)
        .bind(key.platform.as_str())
        .bind(key.counterparty_key())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Find the conversation for `key`, creating it with `placeholder_name`
    /// when none exists.
    ///
    /// At most one active conversation exists per counterparty key, so
    /// concurrent callers racing on a new counterparty all get the same row.
    pub async fn resolve(
        &self,
        key: &ConversationKey<'_>,
        placeholder_name: &str,
        now: i64,
    ) -> Result<Resolved> {
        if let Some(conversation) = self.find(key).await? {
            return Ok(Resolved {
                conversation,
                created: false,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        let inserted = sqlx::query(
            "INSERT INTO conversations (id, owner_id, bot_id, platform, counterparty_id, \
             counterparty_key, display_name, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?) ON CONFLICT DO NOTHING",
        )
        .bind(&id)
        .bind(key.owner_id)
        .bind(key.bot_id)
        .bind(key.platform.as_str())
        .bind(key.counterparty_id)
        .bind(key.counterparty_key())
        .bind(placeholder_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            debug!(bot_id = key.bot_id, platform = %key.platform, "conversation created concurrently");
            let conversation = self.find(key).await?.ok_or_else(|| {
                crate::Error::not_found("conversation", key.counterparty_id)
            })?;
            return Ok(Resolved {
                conversation,
                created: false,
            });
        }
        debug!(conversation_id = %id, bot_id = key.bot_id, platform = %key.platform, "created conversation");

        let conversation = self
            .get(&id)
            .await?
            .ok_or_else(|| crate::Error::not_found("conversation", &id))?;
        Ok(Resolved {
            conversation,
            created: true,
        })
    }

    pub async fn update_display_name(&self, id: &str, name: &str, now: i64) -> Result<()> {
        sqlx::query("UPDATE conversations SET display_name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_status(
        &self,
        id: &str,
        status: ConversationStatus,
        paused_until: Option<i64>,
        now: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE conversations SET status = ?, paused_until = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(paused_until)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append a message and touch the conversation. Returns the message id.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        msg: &NewMessage,
        now: i64,
    ) -> Result<i64> {
        let metadata = serde_json::to_string(&msg.metadata)?;
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (conversation_id, sender_type, content, provider_message_id, \
             metadata, created_at) VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(conversation_id)
        .bind(msg.sender_type.as_str())
        .bind(&msg.content)
        .bind(&msg.provider_message_id)
        .bind(&metadata)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Whether any stored message carries this provider id.
    pub async fn provider_message_exists(&self, provider_message_id: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM messages WHERE provider_message_id = ? LIMIT 1")
                .bind(provider_message_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Whether the client wrote again after message `message_id`.
    pub async fn has_newer_client_message(
        &self,
        conversation_id: &str,
        message_id: i64,
    ) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM messages WHERE conversation_id = ? AND sender_type = ? AND id > ? \
             LIMIT 1",
        )
        .bind(conversation_id)
        .bind(SenderType::Client.as_str())
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Last `limit` messages, oldest first.
    pub async fn recent_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT * FROM (SELECT {MESSAGE_COLUMNS} FROM messages WHERE conversation_id = ? \
             ORDER BY id DESC LIMIT ?) ORDER BY id ASC"
        ))
        .bind(conversation_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
