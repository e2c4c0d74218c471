//! Config schema types (queue, platforms, triggers, inbound, responder, etc.).

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub platforms: PlatformsConfig,
    pub email: EmailConfig,
    pub triggers: TriggersConfig,
    pub inbound: InboundConfig,
    pub responder: ResponderConfig,
    pub schedule: ScheduleConfig,
    pub metrics: MetricsConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    pub port: u16,
    /// Bearer token required on `/api/*` routes. Unset means open.
    pub api_token: Option<String>,
    /// Meta app secret used to verify `X-Hub-Signature-256` on webhooks.
    pub app_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 8787,
            api_token: None,
            app_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://courier.db?mode=rwc".into(),
            max_connections: 5,
        }
    }
}

/// Queue processor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Max rows fetched per loop iteration.
    pub batch_size: u32,
    /// Dispatches running at the same time within a chunk.
    pub concurrency: usize,
    /// Wall-clock budget of a single invocation.
    pub deadline_secs: u64,
    /// Retry budget; a message is terminal once `retry_count` reaches it.
    pub max_retries: u32,
    /// Rows stuck in `processing` longer than this are released.
    pub stale_claim_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 10,
            deadline_secs: 55,
            max_retries: 3,
            stale_claim_secs: 600,
        }
    }
}

/// Provider endpoints. Credentials live in integration records, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub request_timeout_secs: u64,
    pub whatsapp: WhatsAppApiConfig,
    pub instagram: InstagramApiConfig,
}

impl Default for PlatformsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 10,
            whatsapp: WhatsAppApiConfig::default(),
            instagram: InstagramApiConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppApiConfig {
    pub api_base: String,
    pub api_version: String,
}

impl Default for WhatsAppApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".into(),
            api_version: "v21.0".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstagramApiConfig {
    pub api_base: String,
    /// Secondary endpoint tried once when the primary send fails.
    pub fallback_api_base: String,
    pub api_version: String,
}

impl Default for InstagramApiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".into(),
            fallback_api_base: "https://graph.instagram.com".into(),
            api_version: "v21.0".into(),
        }
    }
}

/// Email sub-provider selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    #[default]
    Resend,
    Smtp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub provider: EmailProviderKind,
    pub resend: ResendConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResendConfig {
    pub api_base: String,
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.resend.com".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            username: None,
            password: None,
            use_tls: true,
        }
    }
}

/// Trigger generator knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggersConfig {
    /// IANA timezone that defines "today" for daily scans and retry days.
    pub timezone: String,
    pub birthday_jitter_minutes: u32,
    pub inactive_jitter_hours: u32,
    pub default_inactive_days: u32,
    pub promotion_settle_secs: u64,
    pub promotion_immediate_delay_secs: u64,
    pub promotion_spacing_secs: u64,
    pub insert_batch_size: usize,
    pub welcome_delay_secs: u64,
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".into(),
            birthday_jitter_minutes: 60,
            inactive_jitter_hours: 4,
            default_inactive_days: 30,
            promotion_settle_secs: 3,
            promotion_immediate_delay_secs: 60,
            promotion_spacing_secs: 5,
            insert_batch_size: 100,
            welcome_delay_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundConfig {
    /// Quiet period before replying so bursts coalesce into one reply.
    pub debounce_secs: u64,
    pub dedup_ttl_secs: u64,
}

impl Default for InboundConfig {
    fn default() -> Self {
        Self {
            debounce_secs: 7,
            dedup_ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponderConfig {
    /// Base URL of the AI responder; `RESPONDER_URL` is used when unset.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}

pub const DEFAULT_RESPONDER_URL: &str = "http://127.0.0.1:8080";

impl ResponderConfig {
    /// Configured URL, else `RESPONDER_URL`, else the local default.
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| std::env::var("RESPONDER_URL").ok())
            .unwrap_or_else(|| DEFAULT_RESPONDER_URL.to_string())
    }
}

/// In-process scheduler driving the queue and the daily checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub queue: String,
    pub daily_checks: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue: "* * * * *".into(),
            daily_checks: "0 9 * * *".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub prometheus_endpoint: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prometheus_endpoint: true,
        }
    }
}
