use std::error::Error as StdError;

use courier_common::Platform;

/// Crate-wide result type for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a dispatch can fail. Adapters never surface these to the queue
/// directly; [`crate::SendOutcome::from_result`] flattens them into an error
/// string.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No integration record for the owner on this platform.
    #[error("{platform} integration not configured")]
    IntegrationMissing { platform: Platform },

    /// Integration exists but is switched off.
    #[error("{platform} integration is inactive")]
    IntegrationInactive { platform: Platform },

    /// Integration lacks a credential the provider call needs.
    #[error("{platform} integration incomplete: missing {field}")]
    IncompleteConfig {
        platform: Platform,
        field: &'static str,
    },

    /// Provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Provider { status: u16, body: String },

    /// Provider answered 2xx but without the expected message id.
    #[error("provider response missing message id: {body}")]
    MissingMessageId { body: String },

    /// Input payload or parameter is invalid.
    #[error("invalid dispatch input: {message}")]
    InvalidInput { message: String },

    /// No sender registered for the platform.
    #[error("no sender registered for {platform}")]
    Unsupported { platform: Platform },

    /// Wrapped source error from an external dependency (transport, timeout).
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error(transparent)]
    Store(#[from] courier_store::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Alias used by adapter crates.
pub type DispatchError = Error;

impl Error {
    #[must_use]
    pub fn incomplete(platform: Platform, field: &'static str) -> Self {
        Self::IncompleteConfig { platform, field }
    }

    #[must_use]
    pub fn provider(status: u16, body: impl Into<String>) -> Self {
        Self::Provider {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether the failure stems from the owner's integration setup rather
    /// than the provider.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::IntegrationMissing { .. }
                | Self::IntegrationInactive { .. }
                | Self::IncompleteConfig { .. }
        )
    }
}
