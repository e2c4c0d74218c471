use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use {
    courier_channels::{
        Error, IntegrationLookup, OutboundMessage, PlatformSender, Receipt, Result,
        active_integration, require_credential,
    },
    courier_common::{Platform, phone::normalize_phone},
    courier_store::models::Bot,
};

use crate::payload::build_payload;

/// Endpoint settings shared by every owner.
#[derive(Debug, Clone)]
pub struct WhatsAppSenderConfig {
    pub api_base: String,
    pub api_version: String,
    pub timeout: Duration,
}

impl Default for WhatsAppSenderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".into(),
            api_version: "v21.0".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

/// Sends through the Cloud API `/{phone_number_id}/messages` endpoint.
pub struct WhatsAppSender {
    config: WhatsAppSenderConfig,
    http: reqwest::Client,
    integrations: Arc<dyn IntegrationLookup>,
}

impl WhatsAppSender {
    pub fn new(
        config: WhatsAppSenderConfig,
        integrations: Arc<dyn IntegrationLookup>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::external("building whatsapp http client", e))?;
        Ok(Self {
            config,
            http,
            integrations,
        })
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.api_version,
            urlencoding::encode(phone_number_id)
        )
    }
}

#[async_trait]
impl PlatformSender for WhatsAppSender {
    fn platform(&self) -> Platform {
        Platform::Whatsapp
    }

    async fn deliver(&self, message: &OutboundMessage, bot: &Bot) -> Result<Receipt> {
        let integration =
            active_integration(self.integrations.as_ref(), &message.owner_id, Platform::Whatsapp)
                .await?;
        let token = Secret::new(require_credential(&integration, "access_token")?.to_string());
        let phone_number_id = match integration.credential("phone_number_id") {
            Some(id) => id.to_string(),
            None => bot
                .platform_identifier
                .clone()
                .filter(|id| !id.trim().is_empty())
                .ok_or(Error::incomplete(Platform::Whatsapp, "phone_number_id"))?,
        };

        let to = normalize_phone(&message.recipient);
        if to.is_empty() {
            return Err(Error::invalid_input(format!(
                "recipient is not a phone number: {}",
                message.recipient
            )));
        }
        let payload = build_payload(message, &to)?;

        let resp = self
            .http
            .post(self.messages_url(&phone_number_id))
            .bearer_auth(token.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::external("whatsapp send", e))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::provider(status.as_u16(), body));
        }

        let parsed: SendResponse = serde_json::from_str(&body)
            .map_err(|_| Error::MissingMessageId { body: body.clone() })?;
        let id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingMessageId { body })?;

        debug!(owner_id = %message.owner_id, provider_message_id = %id, "whatsapp message accepted");
        Ok(Receipt::with_id(id))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_store::{IntegrationStore, connect_in_memory, models::Integration},
        mockito::Matcher,
    };

    async fn sender_for(
        server: &mockito::ServerGuard,
        credentials: serde_json::Value,
        active: bool,
    ) -> WhatsAppSender {
        let store = IntegrationStore::new(connect_in_memory().await.unwrap());
        store
            .upsert(&Integration {
                owner_id: "o1".into(),
                platform: Platform::Whatsapp,
                credentials,
                active,
                verified: true,
                updated_at: 0,
            })
            .await
            .unwrap();
        let config = WhatsAppSenderConfig {
            api_base: server.url(),
            ..WhatsAppSenderConfig::default()
        };
        WhatsAppSender::new(config, Arc::new(store)).unwrap()
    }

    fn bot() -> Bot {
        Bot {
            id: "b1".into(),
            owner_id: "o1".into(),
            name: "Bot".into(),
            platform: Platform::Whatsapp,
            platform_identifier: Some("111".into()),
            active: true,
            auto_reply: true,
            created_at: 0,
        }
    }

    fn message() -> OutboundMessage {
        OutboundMessage::text("o1", Platform::Whatsapp, "+54 9 261 123-4567", "Hola")
    }

    #[tokio::test]
    async fn sends_text_and_returns_message_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v21.0/222/messages")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "to": "5492611234567",
                "type": "text",
                "text": {"body": "Hola"}
            })))
            .with_status(200)
            .with_body(r#"{"messaging_product":"whatsapp","messages":[{"id":"wamid.X"}]}"#)
            .create_async()
            .await;

        let sender = sender_for(
            &server,
            serde_json::json!({"access_token": "tok", "phone_number_id": "222"}),
            true,
        )
        .await;
        let outcome = sender.send(&message(), &bot()).await;
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.provider_message_id.as_deref(), Some("wamid.X"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn falls_back_to_bot_identifier_for_phone_number_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v21.0/111/messages")
            .with_status(200)
            .with_body(r#"{"messages":[{"id":"wamid.Y"}]}"#)
            .create_async()
            .await;

        let sender = sender_for(&server, serde_json::json!({"access_token": "tok"}), true).await;
        assert!(sender.send(&message(), &bot()).await.success);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn provider_error_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v21.0/222/messages")
            .with_status(400)
            .with_body(r#"{"error":{"message":"Invalid parameter"}}"#)
            .create_async()
            .await;

        let sender = sender_for(
            &server,
            serde_json::json!({"access_token": "tok", "phone_number_id": "222"}),
            true,
        )
        .await;
        let outcome = sender.send(&message(), &bot()).await;
        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.contains("400"), "{error}");
        assert!(error.contains("Invalid parameter"), "{error}");
    }

    #[tokio::test]
    async fn success_without_message_id_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v21.0/222/messages")
            .with_status(200)
            .with_body(r#"{"messages":[]}"#)
            .create_async()
            .await;

        let sender = sender_for(
            &server,
            serde_json::json!({"access_token": "tok", "phone_number_id": "222"}),
            true,
        )
        .await;
        let outcome = sender.send(&message(), &bot()).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("missing message id"));
    }

    #[tokio::test]
    async fn configuration_errors_never_reach_the_provider() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let inactive = sender_for(&server, serde_json::json!({"access_token": "tok"}), false).await;
        let outcome = inactive.send(&message(), &bot()).await;
        assert_eq!(outcome.error.as_deref(), Some("whatsapp integration is inactive"));

        let incomplete = sender_for(&server, serde_json::json!({}), true).await;
        let outcome = incomplete.send(&message(), &bot()).await;
        assert_eq!(
            outcome.error.as_deref(),
            Some("whatsapp integration incomplete: missing access_token")
        );

        let mut other_owner = message();
        other_owner.owner_id = "o2".into();
        let outcome = incomplete.send(&other_owner, &bot()).await;
        assert_eq!(
            outcome.error.as_deref(),
            Some("whatsapp integration not configured")
        );
        mock.assert_async().await;
    }
}
