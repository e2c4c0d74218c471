use {async_trait::async_trait, courier_common::Platform, courier_store::models::Bot};

/// One inbound text message, normalized from a platform webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub platform: Platform,
    /// Provider-side id of the receiving account (WhatsApp phone-number id,
    /// Instagram account id). Used to find the bot.
    pub account_id: String,
    /// Sender phone number or platform-scoped user id.
    pub sender_id: String,
    /// Display name carried by the payload, when any.
    pub sender_name: Option<String>,
    pub text: String,
    pub provider_message_id: Option<String>,
    /// Provider timestamp in epoch millis.
    pub timestamp_ms: Option<i64>,
}

/// Richer profile data used to upgrade placeholder conversation names.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Best display name for `user_id`, or `None` if the provider has none.
    async fn display_name(&self, bot: &Bot, user_id: &str) -> Option<String>;
}
