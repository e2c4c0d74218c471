use {
    async_trait::async_trait,
    lettre::{
        AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        message::{Mailbox, header::ContentType},
        transport::smtp::{authentication::Credentials, response::Response},
    },
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use {
    courier_channels::{Error, Receipt, Result},
    courier_store::models::Integration,
};

use crate::provider::{Email, EmailProvider};

/// Relay settings for the SMTP provider.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    /// STARTTLS when true, plaintext otherwise.
    pub use_tls: bool,
}

/// Sends through an SMTP relay with lettre's tokio transport.
pub struct SmtpProvider {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpProvider {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let mut builder = if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map_err(|e| Error::external("configuring smtp relay", e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        }
        .port(settings.port);

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                pass.expose_secret().clone(),
            ));
        }
        Ok(Self {
            mailer: builder.build(),
        })
    }
}

/// Build the MIME message.
pub(crate) fn build_message(email: &Email) -> Result<Message> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|e| Error::invalid_input(format!("invalid sender '{}': {e}", email.from)))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e| Error::invalid_input(format!("invalid recipient '{}': {e}", email.to)))?;

    let mut builder = Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN);
    if let Some(reply_to) = &email.reply_to {
        let mailbox: Mailbox = reply_to
            .parse()
            .map_err(|e| Error::invalid_input(format!("invalid reply-to '{reply_to}': {e}")))?;
        builder = builder.reply_to(mailbox);
    }
    builder
        .body(email.text.clone())
        .map_err(|e| Error::external("building email", e))
}

/// Relay response text, used as the provider message id.
fn response_id(response: &Response) -> Option<String> {
    let text = response
        .message()
        .collect::<Vec<_>>()
        .join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &Email, _integration: &Integration) -> Result<Receipt> {
        let message = build_message(email)?;
        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| Error::external("smtp send", e))?;
        let id = response_id(&response);
        debug!(to = %email.to, relay_id = ?id, "smtp relay accepted message");
        Ok(Receipt {
            provider_message_id: id,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email {
            from: "Sol <hola@sol.com>".into(),
            to: "ana@example.com".into(),
            subject: "Hola".into(),
            text: "Cuerpo".into(),
            reply_to: Some("dueno@sol.com".into()),
        }
    }

    #[test]
    fn builds_plain_text_message() {
        let message = build_message(&email()).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Hola"));
        assert!(raw.contains("To: ana@example.com"));
        assert!(raw.contains("Reply-To: dueno@sol.com"));
        assert!(raw.contains("Cuerpo"));
    }

    #[test]
    fn invalid_addresses_are_input_errors() {
        let mut bad = email();
        bad.to = "not-an-address".into();
        assert!(matches!(
            build_message(&bad),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn plaintext_transport_builds_without_connecting() {
        let provider = SmtpProvider::new(&SmtpSettings {
            host: "localhost".into(),
            port: 2525,
            username: Some("u".into()),
            password: Some(Secret::new("p".into())),
            use_tls: false,
        });
        assert!(provider.is_ok());
        assert_eq!(provider.unwrap().name(), "smtp");
    }
}
