use {
    async_trait::async_trait,
    courier_channels::{Receipt, Result},
    courier_store::models::Integration,
};

/// A single plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub reply_to: Option<String>,
}

/// Transport behind the email platform.
///
/// Providers receive the owner's integration so per-owner API keys can
/// override process defaults.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, email: &Email, integration: &Integration) -> Result<Receipt>;
}
