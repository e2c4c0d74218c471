//! Entity types persisted by the store.

use std::collections::BTreeMap;

use {
    courier_common::Platform,
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// Declare a string-backed status enum with `as_str` and `parse`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Result<Self> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(Error::invalid_value(stringify!($name), other)),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum!(
    /// Lifecycle of a queued outbound message.
    MessageStatus {
        Pending => "pending",
        Processing => "processing",
        Sent => "sent",
        Failed => "failed",
    }
);

string_enum!(
    ExecutionStatus {
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
);

string_enum!(
    ConversationStatus {
        Active => "active",
        Paused => "paused",
    }
);

string_enum!(
    SenderType {
        Client => "client",
        Bot => "bot",
    }
);

string_enum!(
    /// Automation category. Each has exactly one trigger generator.
    AutomationKind {
        Birthday => "birthday",
        InactiveClient => "inactive_client",
        Promotion => "promotion",
        Welcome => "welcome",
    }
);

string_enum!(
    /// Status recorded on an audit log row.
    LogStatus {
        Queued => "queued",
        Sent => "sent",
        Failed => "failed",
    }
);

fn parse_platform(value: &str) -> Result<Platform> {
    Ok(value.parse::<Platform>()?)
}

// ── Queue ───────────────────────────────────────────────────────────────────

/// A queued outbound message awaiting dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledMessage {
    pub id: String,
    pub owner_id: String,
    pub automation_id: Option<String>,
    pub client_id: Option<String>,
    pub bot_id: String,
    pub platform: Platform,
    /// Phone number, Instagram-scoped id, or email address.
    pub recipient: String,
    pub content: String,
    /// Platform-specific extras (WhatsApp template, email subject, ...).
    pub metadata: serde_json::Value,
    pub scheduled_for: i64,
    /// Lower is dispatched sooner.
    pub priority: i64,
    pub status: MessageStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub provider_message_id: Option<String>,
    pub claimed_at: Option<i64>,
    pub last_attempt_at: Option<i64>,
    pub sent_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ScheduledMessageRow {
    id: String,
    owner_id: String,
    automation_id: Option<String>,
    client_id: Option<String>,
    bot_id: String,
    platform: String,
    recipient: String,
    content: String,
    metadata: String,
    scheduled_for: i64,
    priority: i64,
    status: String,
    retry_count: i64,
    last_error: Option<String>,
    provider_message_id: Option<String>,
    claimed_at: Option<i64>,
    last_attempt_at: Option<i64>,
    sent_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ScheduledMessageRow> for ScheduledMessage {
    type Error = Error;

    fn try_from(r: ScheduledMessageRow) -> Result<Self> {
        Ok(Self {
            platform: parse_platform(&r.platform)?,
            status: MessageStatus::parse(&r.status)?,
            metadata: serde_json::from_str(&r.metadata)?,
            retry_count: u32::try_from(r.retry_count)
                .map_err(|_| Error::invalid_value("retry_count", r.retry_count.to_string()))?,
            id: r.id,
            owner_id: r.owner_id,
            automation_id: r.automation_id,
            client_id: r.client_id,
            bot_id: r.bot_id,
            recipient: r.recipient,
            content: r.content,
            scheduled_for: r.scheduled_for,
            priority: r.priority,
            last_error: r.last_error,
            provider_message_id: r.provider_message_id,
            claimed_at: r.claimed_at,
            last_attempt_at: r.last_attempt_at,
            sent_at: r.sent_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Fields supplied by a generator when enqueueing.
#[derive(Debug, Clone)]
pub struct NewScheduledMessage {
    pub owner_id: String,
    pub automation_id: Option<String>,
    pub client_id: Option<String>,
    pub bot_id: String,
    pub platform: Platform,
    pub recipient: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub scheduled_for: i64,
    pub priority: i64,
}

pub const DEFAULT_PRIORITY: i64 = 5;

/// One run of a recurring trigger on one calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationExecution {
    pub id: String,
    pub kind: AutomationKind,
    pub day: String,
    pub status: ExecutionStatus,
    pub processed: i64,
    pub enqueued: i64,
    pub skipped: i64,
    pub error: Option<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ExecutionRow {
    id: String,
    kind: String,
    day: String,
    status: String,
    processed: i64,
    enqueued: i64,
    skipped: i64,
    error: Option<String>,
    started_at: i64,
    finished_at: Option<i64>,
}

impl TryFrom<ExecutionRow> for AutomationExecution {
    type Error = Error;

    fn try_from(r: ExecutionRow) -> Result<Self> {
        Ok(Self {
            kind: AutomationKind::parse(&r.kind)?,
            status: ExecutionStatus::parse(&r.status)?,
            id: r.id,
            day: r.day,
            processed: r.processed,
            enqueued: r.enqueued,
            skipped: r.skipped,
            error: r.error,
            started_at: r.started_at,
            finished_at: r.finished_at,
        })
    }
}

// ── Integrations ────────────────────────────────────────────────────────────

/// Provider credentials for one (owner, platform) pair.
#[derive(Debug, Clone, Serialize)]
pub struct Integration {
    pub owner_id: String,
    pub platform: Platform,
    pub credentials: serde_json::Value,
    pub active: bool,
    pub verified: bool,
    pub updated_at: i64,
}

impl Integration {
    /// Non-empty string credential, if present.
    #[must_use]
    pub fn credential(&self, key: &str) -> Option<&str> {
        self.credentials
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct IntegrationRow {
    owner_id: String,
    platform: String,
    credentials: String,
    active: bool,
    verified: bool,
    updated_at: i64,
}

impl TryFrom<IntegrationRow> for Integration {
    type Error = Error;

    fn try_from(r: IntegrationRow) -> Result<Self> {
        Ok(Self {
            platform: parse_platform(&r.platform)?,
            credentials: serde_json::from_str(&r.credentials)?,
            owner_id: r.owner_id,
            active: r.active,
            verified: r.verified,
            updated_at: r.updated_at,
        })
    }
}

// ── Conversations ───────────────────────────────────────────────────────────

/// Per-counterparty chat thread maintained by a bot.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub bot_id: String,
    pub platform: Platform,
    pub counterparty_id: String,
    pub display_name: String,
    pub status: ConversationStatus,
    pub paused_until: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ConversationRow {
    id: String,
    owner_id: String,
    bot_id: String,
    platform: String,
    counterparty_id: String,
    display_name: String,
    status: String,
    paused_until: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = Error;

    fn try_from(r: ConversationRow) -> Result<Self> {
        Ok(Self {
            platform: parse_platform(&r.platform)?,
            status: ConversationStatus::parse(&r.status)?,
            id: r.id,
            owner_id: r.owner_id,
            bot_id: r.bot_id,
            counterparty_id: r.counterparty_id,
            display_name: r.display_name,
            paused_until: r.paused_until,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Append-only chat message.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub sender_type: SenderType,
    pub content: String,
    pub provider_message_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MessageRow {
    id: i64,
    conversation_id: String,
    sender_type: String,
    content: String,
    provider_message_id: Option<String>,
    metadata: String,
    created_at: i64,
}

impl TryFrom<MessageRow> for Message {
    type Error = Error;

    fn try_from(r: MessageRow) -> Result<Self> {
        Ok(Self {
            sender_type: SenderType::parse(&r.sender_type)?,
            metadata: serde_json::from_str(&r.metadata)?,
            id: r.id,
            conversation_id: r.conversation_id,
            content: r.content,
            provider_message_id: r.provider_message_id,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_type: SenderType,
    pub content: String,
    pub provider_message_id: Option<String>,
    pub metadata: serde_json::Value,
}

// ── Business data ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Bot {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub platform: Platform,
    /// WhatsApp phone-number id, Instagram account id, or sender address.
    pub platform_identifier: Option<String>,
    pub active: bool,
    pub auto_reply: bool,
    pub created_at: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct BotRow {
    id: String,
    owner_id: String,
    name: String,
    platform: String,
    platform_identifier: Option<String>,
    active: bool,
    auto_reply: bool,
    created_at: i64,
}

impl TryFrom<BotRow> for Bot {
    type Error = Error;

    fn try_from(r: BotRow) -> Result<Self> {
        Ok(Self {
            platform: parse_platform(&r.platform)?,
            id: r.id,
            owner_id: r.owner_id,
            name: r.name,
            platform_identifier: r.platform_identifier,
            active: r.active,
            auto_reply: r.auto_reply,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct BusinessProfile {
    pub owner_id: String,
    pub business_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Client {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub instagram_id: Option<String>,
    pub email: Option<String>,
    /// `YYYY-MM-DD`; the year may be a placeholder.
    pub birthday: Option<String>,
    pub created_at: i64,
}

impl Client {
    /// Contact field the given platform addresses this client by.
    #[must_use]
    pub fn contact_for(&self, platform: Platform) -> Option<&str> {
        let field = match platform {
            Platform::Whatsapp => &self.phone,
            Platform::Instagram => &self.instagram_id,
            Platform::Email => &self.email,
        };
        field.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// A client together with the time of their most recent order.
#[derive(Debug, Clone)]
pub struct InactiveClient {
    pub client: Client,
    pub last_order_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Promotion {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub discount: Option<String>,
    pub valid_until: Option<String>,
    pub created_at: i64,
}

/// WhatsApp approved-template settings of an automation.
///
/// `variables` maps `var_1`, `var_2`, ... to named fields (`client_name`,
/// `business_name`, ...); the numeric suffix gives the parameter position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatsAppTemplateConfig {
    pub name: String,
    #[serde(default = "default_template_language")]
    pub language: String,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

fn default_template_language() -> String {
    "es".into()
}

/// Per-automation settings stored as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Birthday: send this many days ahead of the date.
    pub days_before: Option<u32>,
    /// Inactivity: days without an order before a client qualifies.
    pub inactive_days: Option<u32>,
    /// Promotion: explicit delay instead of the immediate policy.
    pub delay_hours: Option<f64>,
    /// Promotion: restrict to one promotion; `None` matches all.
    pub promotion_id: Option<String>,
    pub priority: Option<i64>,
    /// Email subject line.
    pub subject: Option<String>,
    pub whatsapp_template: Option<WhatsAppTemplateConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Automation {
    pub id: String,
    pub owner_id: String,
    pub bot_id: String,
    pub kind: AutomationKind,
    pub name: String,
    pub message_template: String,
    pub config: AutomationConfig,
    pub active: bool,
    pub created_at: i64,
}

impl Default for Automation {
    fn default() -> Self {
        Self {
            id: String::new(),
            owner_id: String::new(),
            bot_id: String::new(),
            kind: AutomationKind::Welcome,
            name: String::new(),
            message_template: String::new(),
            config: AutomationConfig::default(),
            active: true,
            created_at: 0,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AutomationRow {
    id: String,
    owner_id: String,
    bot_id: String,
    kind: String,
    name: String,
    message_template: String,
    config: String,
    active: bool,
    created_at: i64,
}

impl TryFrom<AutomationRow> for Automation {
    type Error = Error;

    fn try_from(r: AutomationRow) -> Result<Self> {
        Ok(Self {
            kind: AutomationKind::parse(&r.kind)?,
            config: serde_json::from_str(&r.config)?,
            id: r.id,
            owner_id: r.owner_id,
            bot_id: r.bot_id,
            name: r.name,
            message_template: r.message_template,
            active: r.active,
            created_at: r.created_at,
        })
    }
}

// ── Audit ───────────────────────────────────────────────────────────────────

/// Immutable audit row describing one queue or dispatch event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub owner_id: String,
    pub automation_id: Option<String>,
    pub scheduled_message_id: Option<String>,
    pub client_id: Option<String>,
    pub platform: Platform,
    pub status: LogStatus,
    pub recipient: Option<String>,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl AuditEntry {
    /// Audit row for an event concerning a queued message.
    #[must_use]
    pub fn for_message(message: &ScheduledMessage, status: LogStatus) -> Self {
        Self {
            owner_id: message.owner_id.clone(),
            automation_id: message.automation_id.clone(),
            scheduled_message_id: Some(message.id.clone()),
            client_id: message.client_id.clone(),
            platform: message.platform,
            status,
            recipient: Some(message.recipient.clone()),
            provider_message_id: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditRecord {
    pub id: i64,
    pub owner_id: String,
    pub automation_id: Option<String>,
    pub scheduled_message_id: Option<String>,
    pub client_id: Option<String>,
    pub platform: String,
    pub status: String,
    pub recipient: Option<String>,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            MessageStatus::Pending,
            MessageStatus::Processing,
            MessageStatus::Sent,
            MessageStatus::Failed,
        ] {
            assert_eq!(MessageStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(MessageStatus::parse("queued").is_err());
        assert_eq!(AutomationKind::InactiveClient.to_string(), "inactive_client");
    }

    #[test]
    fn automation_config_tolerates_missing_fields() {
        let config: AutomationConfig = serde_json::from_str(
            r#"{"days_before": 2, "whatsapp_template": {"name": "bday"}}"#,
        )
        .unwrap();
        assert_eq!(config.days_before, Some(2));
        let template = config.whatsapp_template.unwrap();
        assert_eq!(template.language, "es");
        assert!(template.variables.is_empty());
    }

    #[test]
    fn client_contact_ignores_blank_fields() {
        let client = Client {
            id: "c1".into(),
            owner_id: "o1".into(),
            name: "Ana María Pérez".into(),
            phone: Some("  ".into()),
            instagram_id: Some("1789".into()),
            email: None,
            birthday: None,
            created_at: 0,
        };
        assert_eq!(client.contact_for(Platform::Whatsapp), None);
        assert_eq!(client.contact_for(Platform::Instagram), Some("1789"));
        assert_eq!(client.first_name(), "Ana");
    }
}
