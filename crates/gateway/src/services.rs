//! Construction of the platform adapters and collaborators the gateway
//! hands to the queue, the trigger generators and the ingestor.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Context,
    async_trait::async_trait,
    secrecy::Secret,
    tracing::info,
};

use {
    courier_channels::{IntegrationLookup, ProfileLookup, SenderRegistry},
    courier_common::Platform,
    courier_config::{CourierConfig, EmailProviderKind},
    courier_email::{EmailProvider, EmailSender, ResendProvider, SmtpProvider, SmtpSettings},
    courier_inbound::{DedupStore, HttpResponder, MemoryDedupStore, Responder, ResponderRequest},
    courier_instagram::{InstagramProfiles, InstagramSender, InstagramSenderConfig},
    courier_store::Stores,
    courier_whatsapp::{WhatsAppSender, WhatsAppSenderConfig},
};

/// Everything outside the store that the gateway's services talk to.
pub struct GatewayServices {
    pub senders: SenderRegistry,
    pub responder: Arc<dyn Responder>,
    pub dedup: Arc<dyn DedupStore>,
    pub profiles: Vec<(Platform, Arc<dyn ProfileLookup>)>,
}

impl GatewayServices {
    /// Real adapters configured from `config`, reading credentials from the
    /// integration records in `stores`.
    pub fn from_config(config: &CourierConfig, stores: &Stores) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.platforms.request_timeout_secs);
        let integrations: Arc<dyn IntegrationLookup> = Arc::new(stores.integrations.clone());

        let whatsapp = WhatsAppSender::new(
            WhatsAppSenderConfig {
                api_base: config.platforms.whatsapp.api_base.clone(),
                api_version: config.platforms.whatsapp.api_version.clone(),
                timeout,
            },
            Arc::clone(&integrations),
        )?;
        let instagram_api = &config.platforms.instagram;
        let instagram = InstagramSender::new(
            InstagramSenderConfig {
                api_base: instagram_api.api_base.clone(),
                fallback_api_base: instagram_api.fallback_api_base.clone(),
                api_version: instagram_api.api_version.clone(),
                timeout,
            },
            Arc::clone(&integrations),
        )?;
        let email = EmailSender::new(email_provider(config, timeout)?, Arc::clone(&integrations));
        info!(provider = email.provider_name(), "email provider selected");

        let senders = SenderRegistry::new()
            .with(Arc::new(whatsapp))
            .with(Arc::new(instagram))
            .with(Arc::new(email));

        let responder_url = config.responder.resolved_base_url();
        let responder = HttpResponder::new(
            &responder_url,
            Duration::from_secs(config.responder.timeout_secs),
        )
        .context("building responder client")?;
        info!(url = %responder_url, "responder configured");

        let profiles = InstagramProfiles::new(
            instagram_api.api_base.clone(),
            instagram_api.api_version.clone(),
            timeout,
            integrations,
        )
        .context("building instagram profile client")?;

        Ok(Self {
            senders,
            responder: Arc::new(responder),
            dedup: Arc::new(MemoryDedupStore::new()),
            profiles: vec![(Platform::Instagram, Arc::new(profiles))],
        })
    }

    /// No senders and a responder that never answers. Webhook events are
    /// still stored.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            senders: SenderRegistry::new(),
            responder: Arc::new(SilentResponder),
            dedup: Arc::new(MemoryDedupStore::new()),
            profiles: Vec::new(),
        }
    }
}

fn email_provider(
    config: &CourierConfig,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn EmailProvider>> {
    Ok(match config.email.provider {
        EmailProviderKind::Resend => {
            Arc::new(ResendProvider::new(config.email.resend.api_base.clone(), timeout)?)
        },
        EmailProviderKind::Smtp => {
            let smtp = &config.email.smtp;
            let host = smtp
                .host
                .clone()
                .filter(|h| !h.trim().is_empty())
                .context("email.smtp.host is required when email.provider = \"smtp\"")?;
            Arc::new(SmtpProvider::new(&SmtpSettings {
                host,
                port: smtp.port,
                username: smtp.username.clone(),
                password: smtp.password.clone().map(Secret::new),
                use_tls: smtp.use_tls,
            })?)
        },
    })
}

struct SilentResponder;

#[async_trait]
impl Responder for SilentResponder {
    async fn respond(&self, _request: &ResponderRequest) -> courier_inbound::Result<Option<String>> {
        Ok(None)
    }
}
