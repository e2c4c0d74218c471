//! Metrics recorder initialization and configuration.

use tracing::info;

use crate::Result;

/// Handle to the metrics system, providing access to exported metrics.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Handle that renders nothing, used when collection is disabled.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            #[cfg(feature = "prometheus")]
            prometheus_handle: None,
        }
    }

    /// Render metrics in Prometheus text format.
    ///
    /// Returns the metrics as a string suitable for the `/metrics` endpoint.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(metrics_exporter_prometheus::PrometheusHandle::render)
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Call once at startup. With the `prometheus` feature this installs the
/// Prometheus recorder globally; otherwise every facade call is a no-op.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed (for example when
/// another recorder is already registered).
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle::disabled());
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus(config)?;
        info!("prometheus metrics exporter initialized");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle::disabled())
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(
    config: MetricsRecorderConfig,
) -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    use {
        crate::{buckets, queue},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            buckets::HTTP_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Prefix("courier_dispatch_".to_string()),
            buckets::DISPATCH_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Full(queue::INVOCATION_DURATION_SECONDS.to_string()),
            buckets::INVOCATION_DURATION,
        )?;

    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    // Installs globally without spawning an HTTP listener; the gateway
    // serves the rendered text itself.
    Ok(builder.install_recorder()?)
}
