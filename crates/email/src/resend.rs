use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use {
    courier_channels::{Error, Receipt, Result, require_credential},
    courier_store::models::Integration,
};

use crate::provider::{Email, EmailProvider};

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    id: Option<String>,
}

/// Resend HTTP API (`POST /emails`), keyed by the integration's `api_key`.
pub struct ResendProvider {
    api_base: String,
    http: reqwest::Client,
}

impl ResendProvider {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::external("building resend http client", e))?;
        Ok(Self {
            api_base: api_base.into(),
            http,
        })
    }
}

#[async_trait]
impl EmailProvider for ResendProvider {
    fn name(&self) -> &'static str {
        "resend"
    }

    async fn send(&self, email: &Email, integration: &Integration) -> Result<Receipt> {
        let key = Secret::new(require_credential(integration, "api_key")?.to_string());
        let body = SendRequest {
            from: &email.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.text,
            reply_to: email.reply_to.as_deref(),
        };

        let resp = self
            .http
            .post(format!("{}/emails", self.api_base.trim_end_matches('/')))
            .bearer_auth(key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::external("resend send", e))?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::provider(status.as_u16(), text));
        }
        let parsed: SendResponse = serde_json::from_str(&text)
            .map_err(|_| Error::MissingMessageId { body: text.clone() })?;
        parsed
            .id
            .filter(|id| !id.is_empty())
            .map(Receipt::with_id)
            .ok_or(Error::MissingMessageId { body: text })
    }
}
