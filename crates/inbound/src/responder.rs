//! Client for the external AI responder.

use std::time::Duration;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{Error, Result};

/// What the responder is asked to answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderRequest {
    pub bot_id: String,
    pub message: String,
    pub conversation_id: String,
    /// Sender phone number or platform-scoped id.
    pub sender_identity: String,
}

#[derive(Deserialize)]
struct ResponderReply {
    response: Option<String>,
}

/// Generates the text of an automated reply. `Ok(None)` means the responder
/// chose not to answer.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, request: &ResponderRequest) -> Result<Option<String>>;
}

/// Posts to `{base_url}/respond`.
pub struct HttpResponder {
    url: String,
    http: reqwest::Client,
}

impl HttpResponder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: format!("{}/respond", base_url.trim_end_matches('/')),
            http: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn respond(&self, request: &ResponderRequest) -> Result<Option<String>> {
        let resp = self.http.post(&self.url).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Responder {
                status: status.as_u16(),
                body,
            });
        }
        let reply: ResponderReply = resp.json().await?;
        debug!(
            conversation_id = %request.conversation_id,
            has_reply = reply.response.is_some(),
            "responder answered"
        );
        Ok(reply
            .response
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher};

    fn request() -> ResponderRequest {
        ResponderRequest {
            bot_id: "b1".into(),
            message: "¿Tienen turnos mañana?".into(),
            conversation_id: "conv-1".into(),
            sender_identity: "5492611234567".into(),
        }
    }

    #[tokio::test]
    async fn posts_camel_case_and_reads_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/respond")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "botId": "b1",
                "conversationId": "conv-1",
                "senderIdentity": "5492611234567",
            })))
            .with_status(200)
            .with_body(r#"{"response":"  Sí, desde las 9  "}"#)
            .create_async()
            .await;

        let responder = HttpResponder::new(&server.url(), Duration::from_secs(5)).unwrap();
        let reply = responder.respond(&request()).await.unwrap();
        assert_eq!(reply.as_deref(), Some("Sí, desde las 9"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_response_means_no_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/respond")
            .with_status(200)
            .with_body(r#"{"response":""}"#)
            .create_async()
            .await;
        let responder = HttpResponder::new(&server.url(), Duration::from_secs(5)).unwrap();
        assert_eq!(responder.respond(&request()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn http_error_carries_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/respond")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;
        let responder = HttpResponder::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = responder.respond(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "responder returned HTTP 503: overloaded");
    }
}
