//! Configuration loading, env substitution, and validation.
//!
//! Config files: `courier.toml`, `courier.yaml`, or `courier.json`
//! Searched in `./` then `~/.config/courier/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in the raw file.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config, write_default_config},
    schema::{
        CourierConfig, DatabaseConfig, EmailConfig, EmailProviderKind, InboundConfig,
        InstagramApiConfig, MetricsConfig, PlatformsConfig, QueueConfig, ResendConfig,
        ResponderConfig, ScheduleConfig, ServerConfig, SmtpConfig, TriggersConfig,
        WhatsAppApiConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult},
};
