use std::sync::Arc;

use {async_trait::async_trait, tracing::debug};

use {
    courier_channels::{
        Error, IntegrationLookup, OutboundMessage, PlatformSender, Receipt, Result,
        active_integration, require_credential,
    },
    courier_common::Platform,
    courier_store::models::Bot,
};

use crate::provider::{Email, EmailProvider};

/// Subject used when the message metadata carries none.
pub const DEFAULT_SUBJECT: &str = "Tenés un mensaje nuevo";

/// Email platform sender.
///
/// Reads the sender address (`from`) and optional `reply_to` from the owner's
/// integration and the subject from message metadata.
pub struct EmailSender {
    provider: Arc<dyn EmailProvider>,
    integrations: Arc<dyn IntegrationLookup>,
}

impl EmailSender {
    pub fn new(provider: Arc<dyn EmailProvider>, integrations: Arc<dyn IntegrationLookup>) -> Self {
        Self {
            provider,
            integrations,
        }
    }

    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }
}

fn looks_like_address(value: &str) -> bool {
    let Some((local, domain)) = value.rsplit_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !value.contains(char::is_whitespace)
}

#[async_trait]
impl PlatformSender for EmailSender {
    fn platform(&self) -> Platform {
        Platform::Email
    }

    async fn deliver(&self, message: &OutboundMessage, _bot: &Bot) -> Result<Receipt> {
        let integration =
            active_integration(self.integrations.as_ref(), &message.owner_id, Platform::Email)
                .await?;
        let from = require_credential(&integration, "from")?.to_string();

        let to = message.recipient.trim();
        if !looks_like_address(to) {
            return Err(Error::invalid_input(format!("invalid email recipient: {to}")));
        }
        if message.content.trim().is_empty() {
            return Err(Error::invalid_input("empty message content"));
        }

        let email = Email {
            from,
            to: to.to_string(),
            subject: message.meta_str("subject").unwrap_or(DEFAULT_SUBJECT).to_string(),
            text: message.content.clone(),
            reply_to: integration.credential("reply_to").map(str::to_string),
        };
        debug!(
            owner_id = %message.owner_id,
            provider = self.provider.name(),
            "dispatching email"
        );
        self.provider.send(&email, &integration).await
    }
}
