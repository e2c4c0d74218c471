use {async_trait::async_trait, serde::Serialize};

/// Severity shown next to a notification in the business dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// A user-facing notification addressed to a business owner.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub owner_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

impl Notification {
    pub fn new(
        owner_id: impl Into<String>,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            title: title.into(),
            message: message.into(),
            kind,
            link: None,
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Fire-and-forget sink for notifications. Implementations log their own
/// failures; callers never observe them.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: Notification);
}
