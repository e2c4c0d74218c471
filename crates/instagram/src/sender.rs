use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    serde_json::json,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, dispatch as dispatch_metrics, labels};

use {
    courier_channels::{
        Error, IntegrationLookup, OutboundMessage, PlatformSender, Receipt, Result,
        active_integration, require_credential,
    },
    courier_common::Platform,
    courier_store::models::{Bot, Integration},
};

/// Endpoint settings shared by every owner.
#[derive(Debug, Clone)]
pub struct InstagramSenderConfig {
    pub api_base: String,
    /// Tried once, addressed by the account id, when the primary call fails.
    pub fallback_api_base: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for InstagramSenderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".into(),
            fallback_api_base: "https://graph.instagram.com".into(),
            api_version: "v21.0".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct SendResponse {
    message_id: Option<String>,
}

/// Sends direct messages through the Graph API.
pub struct InstagramSender {
    config: InstagramSenderConfig,
    http: reqwest::Client,
    integrations: Arc<dyn IntegrationLookup>,
}

impl InstagramSender {
    pub fn new(
        config: InstagramSenderConfig,
        integrations: Arc<dyn IntegrationLookup>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::external("building instagram http client", e))?;
        Ok(Self {
            config,
            http,
            integrations,
        })
    }

    fn primary_url(&self) -> String {
        format!(
            "{}/{}/me/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_version
        )
    }

    fn fallback_url(&self, account_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.fallback_api_base.trim_end_matches('/'),
            self.config.api_version,
            urlencoding::encode(account_id)
        )
    }

    async fn post(
        &self,
        url: &str,
        token: &Secret<String>,
        recipient: &str,
        text: &str,
    ) -> Result<Receipt> {
        let payload = json!({
            "recipient": {"id": recipient},
            "message": {"text": text},
        });
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::external("instagram send", e))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::provider(status.as_u16(), body));
        }
        let parsed: SendResponse = serde_json::from_str(&body)
            .map_err(|_| Error::MissingMessageId { body: body.clone() })?;
        parsed
            .message_id
            .filter(|id| !id.is_empty())
            .map(Receipt::with_id)
            .ok_or(Error::MissingMessageId { body })
    }
}

/// Account the fallback endpoint is addressed to.
fn account_id(integration: &Integration, bot: &Bot) -> Option<String> {
    integration
        .credential("instagram_account_id")
        .or_else(|| integration.credential("page_id"))
        .map(str::to_string)
        .or_else(|| {
            bot.platform_identifier
                .clone()
                .filter(|id| !id.trim().is_empty())
        })
}

#[async_trait]
impl PlatformSender for InstagramSender {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn deliver(&self, message: &OutboundMessage, bot: &Bot) -> Result<Receipt> {
        let integration =
            active_integration(self.integrations.as_ref(), &message.owner_id, Platform::Instagram)
                .await?;
        let token = Secret::new(require_credential(&integration, "access_token")?.to_string());

        let recipient = message.recipient.trim();
        if recipient.is_empty() {
            return Err(Error::invalid_input("empty instagram recipient"));
        }
        if message.content.trim().is_empty() {
            return Err(Error::invalid_input("empty message content"));
        }

        let primary = self
            .post(&self.primary_url(), &token, recipient, &message.content)
            .await;
        let primary_err = match primary {
            Ok(receipt) => return Ok(receipt),
            Err(e) => e,
        };

        let Some(account) = account_id(&integration, bot) else {
            return Err(primary_err);
        };
        warn!(
            owner_id = %message.owner_id,
            error = %primary_err,
            "instagram primary endpoint failed, trying fallback"
        );

        let fallback = self
            .post(&self.fallback_url(&account), &token, recipient, &message.content)
            .await;

        #[cfg(feature = "metrics")]
        counter!(
            dispatch_metrics::FALLBACK_TOTAL,
            labels::PLATFORM => Platform::Instagram.as_str(),
            labels::OUTCOME => if fallback.is_ok() { "sent" } else { "failed" }
        )
        .increment(1);

        match fallback {
            Ok(receipt) => {
                debug!(owner_id = %message.owner_id, "instagram fallback endpoint accepted message");
                Ok(receipt)
            },
            Err(e) => {
                warn!(owner_id = %message.owner_id, error = %e, "instagram fallback endpoint failed");
                Err(e)
            },
        }
    }
}
