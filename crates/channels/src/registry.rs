use std::{collections::HashMap, sync::Arc};

use {
    courier_common::Platform,
    courier_store::models::Bot,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, dispatch as dispatch_metrics, histogram, labels};

use crate::{Error, OutboundMessage, PlatformSender, SendOutcome};

/// Senders keyed by the platform they deliver to.
#[derive(Clone, Default)]
pub struct SenderRegistry {
    senders: HashMap<Platform, Arc<dyn PlatformSender>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sender, replacing any previous one for its platform.
    pub fn register(&mut self, sender: Arc<dyn PlatformSender>) {
        self.senders.insert(sender.platform(), sender);
    }

    #[must_use]
    pub fn with(mut self, sender: Arc<dyn PlatformSender>) -> Self {
        self.register(sender);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn PlatformSender>> {
        self.senders.get(&platform)
    }

    pub fn platforms(&self) -> Vec<Platform> {
        let mut list: Vec<_> = self.senders.keys().copied().collect();
        list.sort();
        list
    }

    /// Dispatch through the sender matching the message's platform.
    pub async fn send(&self, message: &OutboundMessage, bot: &Bot) -> SendOutcome {
        let Some(sender) = self.get(message.platform) else {
            return SendOutcome::failed(
                Error::Unsupported {
                    platform: message.platform,
                }
                .to_string(),
            );
        };

        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let outcome = sender.send(message, bot).await;

        #[cfg(feature = "metrics")]
        {
            let result = if outcome.success { "sent" } else { "failed" };
            counter!(
                dispatch_metrics::REQUESTS_TOTAL,
                labels::PLATFORM => message.platform.as_str(),
                labels::OUTCOME => result
            )
            .increment(1);
            histogram!(
                dispatch_metrics::REQUEST_DURATION_SECONDS,
                labels::PLATFORM => message.platform.as_str()
            )
            .record(started.elapsed().as_secs_f64());
        }

        match &outcome.error {
            None => debug!(
                platform = %message.platform,
                recipient = %message.recipient,
                provider_message_id = ?outcome.provider_message_id,
                "dispatch succeeded"
            ),
            Some(error) => warn!(
                platform = %message.platform,
                recipient = %message.recipient,
                error = %error,
                "dispatch failed"
            ),
        }
        outcome
    }
}
