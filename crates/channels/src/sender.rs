use {
    async_trait::async_trait,
    courier_common::Platform,
    courier_store::{
        IntegrationStore,
        models::{Bot, Integration, ScheduledMessage},
    },
    serde::Serialize,
};

use crate::{Error, Result};

/// A message ready for a provider call.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// Queue row id, when the message comes from the queue.
    pub id: Option<String>,
    pub owner_id: String,
    pub platform: Platform,
    pub recipient: String,
    pub content: String,
    /// Platform extras: WhatsApp `template`/`template_params`, email `subject`.
    pub metadata: serde_json::Value,
}

impl OutboundMessage {
    /// Plain text reply with no queue row behind it.
    pub fn text(
        owner_id: impl Into<String>,
        platform: Platform,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            owner_id: owner_id.into(),
            platform,
            recipient: recipient.into(),
            content: content.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// String value from metadata, ignoring blanks.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

impl From<&ScheduledMessage> for OutboundMessage {
    fn from(msg: &ScheduledMessage) -> Self {
        Self {
            id: Some(msg.id.clone()),
            owner_id: msg.owner_id.clone(),
            platform: msg.platform,
            recipient: msg.recipient.clone(),
            content: msg.content.clone(),
            metadata: msg.metadata.clone(),
        }
    }
}

/// Uniform result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl SendOutcome {
    #[must_use]
    pub fn sent(provider_message_id: Option<String>) -> Self {
        Self {
            success: true,
            provider_message_id,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }

    /// Flatten an adapter result; every error kind becomes a failed outcome.
    #[must_use]
    pub fn from_result(result: Result<Receipt>) -> Self {
        match result {
            Ok(receipt) => Self::sent(receipt.provider_message_id),
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// What a provider returned for an accepted message.
#[derive(Debug, Clone, Default)]
pub struct Receipt {
    pub provider_message_id: Option<String>,
}

impl Receipt {
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            provider_message_id: Some(id.into()),
        }
    }
}

/// Capability of delivering a message on one platform.
///
/// Implementations report failures through [`PlatformSender::deliver`];
/// callers use [`PlatformSender::send`], which never fails.
#[async_trait]
pub trait PlatformSender: Send + Sync {
    fn platform(&self) -> Platform;

    /// Perform the provider call.
    async fn deliver(&self, message: &OutboundMessage, bot: &Bot) -> Result<Receipt>;

    async fn send(&self, message: &OutboundMessage, bot: &Bot) -> SendOutcome {
        SendOutcome::from_result(self.deliver(message, bot).await)
    }
}

/// Source of per-owner provider credentials.
#[async_trait]
pub trait IntegrationLookup: Send + Sync {
    async fn integration(
        &self,
        owner_id: &str,
        platform: Platform,
    ) -> courier_store::Result<Option<Integration>>;
}

#[async_trait]
impl IntegrationLookup for IntegrationStore {
    async fn integration(
        &self,
        owner_id: &str,
        platform: Platform,
    ) -> courier_store::Result<Option<Integration>> {
        self.get(owner_id, platform).await
    }
}

/// Load the owner's integration, rejecting missing or inactive records.
pub async fn active_integration(
    lookup: &dyn IntegrationLookup,
    owner_id: &str,
    platform: Platform,
) -> Result<Integration> {
    let integration = lookup
        .integration(owner_id, platform)
        .await?
        .ok_or(Error::IntegrationMissing { platform })?;
    if !integration.active {
        return Err(Error::IntegrationInactive { platform });
    }
    Ok(integration)
}

/// Required string credential.
pub fn require_credential<'a>(integration: &'a Integration, field: &'static str) -> Result<&'a str> {
    integration
        .credential(field)
        .ok_or(Error::incomplete(integration.platform, field))
}
