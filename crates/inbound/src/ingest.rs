//! Inbound event pipeline.
//!
//! route to bot -> dedup -> resolve conversation -> persist -> gate ->
//! debounce -> respond -> persist reply -> dispatch.

use std::{collections::HashMap, sync::Arc, time::Duration};

use {
    serde::Serialize,
    serde_json::json,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, histogram, inbound as inbound_metrics, labels};

use {
    courier_channels::{InboundEvent, OutboundMessage, ProfileLookup, SenderRegistry},
    courier_common::{
        Platform,
        time::{ClockFn, system_clock},
    },
    courier_config::CourierConfig,
    courier_store::{
        AuditLog, BusinessStore, ConversationKey, ConversationStore, Resolved, Stores,
        audit::USAGE_AUTO_REPLY,
        models::{Bot, Conversation, ConversationStatus, NewMessage, SenderType},
    },
};

use crate::{
    Result,
    dedup::DedupStore,
    responder::{Responder, ResponderRequest},
    text::normalize_text,
};

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Quiet period before replying; a newer client message inside it
    /// supersedes the pending reply.
    pub debounce: Duration,
    pub dedup_ttl: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(7),
            dedup_ttl: Duration::from_secs(60),
        }
    }
}

impl IngestSettings {
    #[must_use]
    pub fn from_config(config: &CourierConfig) -> Self {
        Self {
            debounce: Duration::from_secs(config.inbound.debounce_secs),
            dedup_ttl: Duration::from_secs(config.inbound.dedup_ttl_secs),
        }
    }
}

/// How one inbound event was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// No active bot owns the receiving account.
    Unrouted,
    Duplicate,
    /// Stored; the bot does not auto-reply.
    Stored { conversation_id: String },
    Paused { conversation_id: String },
    /// A newer client message arrived during the debounce window.
    Superseded { conversation_id: String },
    /// The responder chose not to answer.
    NoReply { conversation_id: String },
    ResponderFailed {
        conversation_id: String,
        error: String,
    },
    Replied {
        conversation_id: String,
        delivered: bool,
        error: Option<String>,
    },
}

impl IngestOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unrouted => "unrouted",
            Self::Duplicate => "duplicate",
            Self::Stored { .. } => "stored",
            Self::Paused { .. } => "paused",
            Self::Superseded { .. } => "superseded",
            Self::NoReply { .. } => "no_reply",
            Self::ResponderFailed { .. } => "responder_failed",
            Self::Replied { .. } => "replied",
        }
    }
}

pub struct Ingestor {
    settings: IngestSettings,
    business: BusinessStore,
    conversations: ConversationStore,
    audit: AuditLog,
    senders: SenderRegistry,
    responder: Arc<dyn Responder>,
    dedup: Arc<dyn DedupStore>,
    profiles: HashMap<Platform, Arc<dyn ProfileLookup>>,
    clock: ClockFn,
}

impl Ingestor {
    pub fn new(
        stores: &Stores,
        senders: SenderRegistry,
        responder: Arc<dyn Responder>,
        dedup: Arc<dyn DedupStore>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            settings,
            business: stores.business.clone(),
            conversations: stores.conversations.clone(),
            audit: stores.audit.clone(),
            senders,
            responder,
            dedup,
            profiles: HashMap::new(),
            clock: system_clock(),
        }
    }

    /// Use `lookup` to upgrade placeholder names on `platform`.
    #[must_use]
    pub fn with_profiles(mut self, platform: Platform, lookup: Arc<dyn ProfileLookup>) -> Self {
        self.profiles.insert(platform, lookup);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: ClockFn) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Webhook subscription handshake: the verify token must be a known bot id.
    pub async fn verify_token(&self, token: &str) -> Result<bool> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(false);
        }
        Ok(self.business.bot_id_known(token).await?)
    }

    pub async fn ingest(&self, event: &InboundEvent) -> Result<IngestOutcome> {
        #[cfg(feature = "metrics")]
        counter!(
            inbound_metrics::EVENTS_RECEIVED_TOTAL,
            labels::PLATFORM => event.platform.as_str()
        )
        .increment(1);

        let outcome = self.handle(event).await?;
        debug!(
            platform = %event.platform,
            sender_id = %event.sender_id,
            outcome = outcome.as_str(),
            "inbound event handled"
        );
        Ok(outcome)
    }

    async fn handle(&self, event: &InboundEvent) -> Result<IngestOutcome> {
        let Some(bot) = self
            .business
            .find_bot_by_identifier(event.platform, &event.account_id)
            .await?
        else {
            warn!(
                platform = %event.platform,
                account_id = %event.account_id,
                "inbound event for unknown account"
            );
            #[cfg(feature = "metrics")]
            counter!(
                inbound_metrics::EVENTS_UNROUTED_TOTAL,
                labels::PLATFORM => event.platform.as_str()
            )
            .increment(1);
            return Ok(IngestOutcome::Unrouted);
        };

        let Some(marks) = self.mark_seen(event).await? else {
            #[cfg(feature = "metrics")]
            counter!(
                inbound_metrics::EVENTS_DUPLICATE_TOTAL,
                labels::PLATFORM => event.platform.as_str()
            )
            .increment(1);
            return Ok(IngestOutcome::Duplicate);
        };

        let now = self.now();
        let (conversation, created, message_id) = match self.store_inbound(&bot, event, now).await
        {
            Ok(stored) => stored,
            Err(e) => {
                // Not stored, so a redelivery must not be dropped as a duplicate.
                self.release(&marks).await;
                return Err(e);
            },
        };
        let conversation_id = conversation.id.clone();
        info!(
            conversation_id,
            bot_id = %bot.id,
            platform = %event.platform,
            created,
            message_id,
            "inbound message stored"
        );

        self.upgrade_display_name(&bot, &conversation, event, now)
            .await?;

        if !bot.auto_reply {
            return Ok(IngestOutcome::Stored { conversation_id });
        }
        if !self.reply_allowed(&conversation, now).await? {
            debug!(conversation_id, "conversation paused, not replying");
            #[cfg(feature = "metrics")]
            counter!(
                inbound_metrics::REPLIES_PAUSED_TOTAL,
                labels::PLATFORM => event.platform.as_str()
            )
            .increment(1);
            return Ok(IngestOutcome::Paused { conversation_id });
        }

        if !self.settings.debounce.is_zero() {
            tokio::time::sleep(self.settings.debounce).await;
        }
        if self
            .conversations
            .has_newer_client_message(&conversation_id, message_id)
            .await?
        {
            debug!(conversation_id, message_id, "superseded by a newer message");
            #[cfg(feature = "metrics")]
            counter!(
                inbound_metrics::REPLIES_SUPERSEDED_TOTAL,
                labels::PLATFORM => event.platform.as_str()
            )
            .increment(1);
            return Ok(IngestOutcome::Superseded { conversation_id });
        }

        // The conversation may have been paused during the wait.
        if let Some(current) = self.conversations.get(&conversation_id).await?
            && !self.reply_allowed(&current, self.now()).await?
        {
            debug!(conversation_id, "conversation paused during debounce, not replying");
            #[cfg(feature = "metrics")]
            counter!(
                inbound_metrics::REPLIES_PAUSED_TOTAL,
                labels::PLATFORM => event.platform.as_str()
            )
            .increment(1);
            return Ok(IngestOutcome::Paused { conversation_id });
        }

        self.reply(&bot, conversation_id, message_id, event).await
    }

    /// Mark the event's dedup keys. Returns `None` for a duplicate, otherwise
    /// the keys this call marked.
    ///
    /// WhatsApp retries deliver the same message id. Instagram can emit
    /// several events with different ids for one message, so it is also
    /// keyed on sender and normalized text.
    async fn mark_seen(&self, event: &InboundEvent) -> Result<Option<Vec<String>>> {
        let ttl = self.settings.dedup_ttl;
        let mut marks = Vec::with_capacity(2);
        if event.platform == Platform::Instagram {
            let key = format!(
                "instagram:{}:{}",
                event.sender_id,
                normalize_text(&event.text)
            );
            if self.dedup.check_and_mark(&key, ttl).await {
                debug!(sender_id = %event.sender_id, "duplicate instagram text");
                return Ok(None);
            }
            marks.push(key);
        }
        let Some(id) = event.provider_message_id.as_deref() else {
            return Ok(Some(marks));
        };
        let key = format!("{}:{id}", event.platform);
        if self.dedup.check_and_mark(&key, ttl).await {
            debug!(provider_message_id = id, "duplicate provider message id");
            self.release(&marks).await;
            return Ok(None);
        }
        marks.push(key);

        match self.conversations.provider_message_exists(id).await {
            Ok(true) => Ok(None),
            Ok(false) => Ok(Some(marks)),
            Err(e) => {
                self.release(&marks).await;
                Err(e.into())
            },
        }
    }

    async fn release(&self, marks: &[String]) {
        for key in marks {
            self.dedup.unmark(key).await;
        }
    }

    /// Resolve the conversation and append the client's message.
    async fn store_inbound(
        &self,
        bot: &Bot,
        event: &InboundEvent,
        now: i64,
    ) -> Result<(Conversation, bool, i64)> {
        let key = ConversationKey {
            owner_id: &bot.owner_id,
            bot_id: &bot.id,
            platform: event.platform,
            counterparty_id: &event.sender_id,
        };
        let placeholder = payload_name(event).unwrap_or(event.sender_id.as_str());
        let Resolved {
            conversation,
            created,
        } = self.conversations.resolve(&key, placeholder, now).await?;

        let message_id = self
            .conversations
            .append_message(
                &conversation.id,
                &NewMessage {
                    sender_type: SenderType::Client,
                    content: event.text.clone(),
                    provider_message_id: event.provider_message_id.clone(),
                    metadata: json!({
                        "platform": event.platform,
                        "account_id": event.account_id,
                        "sender_id": event.sender_id,
                        "provider_timestamp": event.timestamp_ms,
                    }),
                },
                now,
            )
            .await?;
        Ok((conversation, created, message_id))
    }

    /// Replace a placeholder display name with the payload name or, failing
    /// that, the provider profile. Lookup failures leave the name as is.
    async fn upgrade_display_name(
        &self,
        bot: &Bot,
        conversation: &Conversation,
        event: &InboundEvent,
        now: i64,
    ) -> Result<()> {
        let current = conversation.display_name.trim();
        let is_placeholder = current.is_empty()
            || current == conversation.counterparty_id
            || current == event.sender_id;
        if !is_placeholder {
            return Ok(());
        }

        let name = match payload_name(event) {
            Some(name) => Some(name.to_string()),
            None => match self.profiles.get(&event.platform) {
                Some(lookup) => lookup.display_name(bot, &event.sender_id).await,
                None => None,
            },
        };
        if let Some(name) = name.filter(|n| n != current) {
            self.conversations
                .update_display_name(&conversation.id, &name, now)
                .await?;
            debug!(conversation_id = %conversation.id, name, "display name upgraded");
        }
        Ok(())
    }

    /// Paused conversations get no automated replies until `paused_until`.
    /// A pause past its expiry is lifted here; a pause without expiry holds.
    async fn reply_allowed(&self, conversation: &Conversation, now: i64) -> Result<bool> {
        if conversation.status != ConversationStatus::Paused {
            return Ok(true);
        }
        match conversation.paused_until {
            Some(until) if until <= now => {
                self.conversations
                    .set_status(&conversation.id, ConversationStatus::Active, None, now)
                    .await?;
                info!(conversation_id = %conversation.id, "pause expired, conversation active");
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn reply(
        &self,
        bot: &Bot,
        conversation_id: String,
        message_id: i64,
        event: &InboundEvent,
    ) -> Result<IngestOutcome> {
        let request = ResponderRequest {
            bot_id: bot.id.clone(),
            message: event.text.clone(),
            conversation_id: conversation_id.clone(),
            sender_identity: event.sender_id.clone(),
        };

        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();
        let result = self.responder.respond(&request).await;
        #[cfg(feature = "metrics")]
        histogram!(
            inbound_metrics::RESPONDER_DURATION_SECONDS,
            labels::PLATFORM => event.platform.as_str()
        )
        .record(started.elapsed().as_secs_f64());

        let text = match result {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(IngestOutcome::NoReply { conversation_id }),
            Err(e) => {
                warn!(conversation_id, error = %e, "responder failed");
                #[cfg(feature = "metrics")]
                counter!(
                    inbound_metrics::RESPONDER_ERRORS_TOTAL,
                    labels::PLATFORM => event.platform.as_str()
                )
                .increment(1);
                return Ok(IngestOutcome::ResponderFailed {
                    conversation_id,
                    error: e.to_string(),
                });
            },
        };

        let now = self.now();
        self.conversations
            .append_message(
                &conversation_id,
                &NewMessage {
                    sender_type: SenderType::Bot,
                    content: text.clone(),
                    provider_message_id: None,
                    metadata: json!({ "source": "auto_reply", "in_reply_to": message_id }),
                },
                now,
            )
            .await?;

        let outbound = OutboundMessage::text(&bot.owner_id, event.platform, &event.sender_id, text);
        let outcome = self.senders.send(&outbound, bot).await;
        if outcome.success {
            self.audit
                .record_usage(&bot.owner_id, USAGE_AUTO_REPLY, event.platform, None, now)
                .await?;
            #[cfg(feature = "metrics")]
            counter!(
                inbound_metrics::REPLIES_SENT_TOTAL,
                labels::PLATFORM => event.platform.as_str()
            )
            .increment(1);
            info!(conversation_id, platform = %event.platform, "auto-reply sent");
        } else {
            warn!(
                conversation_id,
                platform = %event.platform,
                error = outcome.error.as_deref().unwrap_or_default(),
                "auto-reply dispatch failed"
            );
        }
        Ok(IngestOutcome::Replied {
            conversation_id,
            delivered: outcome.success,
            error: outcome.error,
        })
    }
}

fn payload_name(event: &InboundEvent) -> Option<&str> {
    event
        .sender_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
}
