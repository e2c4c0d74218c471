use std::sync::Arc;

use {
    courier_common::NotificationSink,
    courier_config::CourierConfig,
    courier_inbound::{IngestSettings, Ingestor},
    courier_queue::{QueueProcessor, QueueSettings},
    courier_store::Stores,
    courier_triggers::{TriggerService, TriggerSettings},
};

#[cfg(feature = "metrics")]
use courier_metrics::MetricsHandle;

use crate::services::GatewayServices;

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CourierConfig>,
    pub stores: Stores,
    pub queue: Arc<QueueProcessor>,
    pub triggers: Arc<TriggerService>,
    pub ingestor: Arc<Ingestor>,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<MetricsHandle>,
}

impl AppState {
    pub fn new(
        config: CourierConfig,
        stores: Stores,
        services: GatewayServices,
    ) -> anyhow::Result<Self> {
        let notifier: Arc<dyn NotificationSink> = Arc::new(stores.notifications.clone());

        let queue = QueueProcessor::new(
            &stores,
            services.senders.clone(),
            Arc::clone(&notifier),
            QueueSettings::from_config(&config)?,
        );
        let triggers =
            TriggerService::new(&stores, notifier, TriggerSettings::from_config(&config)?);
        let ingestor = services.profiles.into_iter().fold(
            Ingestor::new(
                &stores,
                services.senders,
                services.responder,
                services.dedup,
                IngestSettings::from_config(&config),
            ),
            |ingestor, (platform, lookup)| ingestor.with_profiles(platform, lookup),
        );

        Ok(Self {
            config: Arc::new(config),
            stores,
            queue: Arc::new(queue),
            triggers: Arc::new(triggers),
            ingestor: Arc::new(ingestor),
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        })
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, handle: MetricsHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Bearer token guarding `/api/*`, when configured.
    pub fn api_token(&self) -> Option<&str> {
        non_empty(self.config.server.api_token.as_deref())
    }

    /// Meta app secret for webhook signatures, when configured.
    pub fn app_secret(&self) -> Option<&str> {
        non_empty(self.config.server.app_secret.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
