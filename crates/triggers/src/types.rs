use std::{fmt, str::FromStr};

use {
    courier_store::models::AutomationKind,
    serde::{Deserialize, Serialize},
};

use crate::Error;

/// Trigger names accepted by the automation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    #[serde(rename = "birthday.check")]
    BirthdayCheck,
    #[serde(rename = "inactive_client.check")]
    InactiveClientCheck,
    #[serde(rename = "promotion.broadcast")]
    PromotionBroadcast,
    #[serde(rename = "welcome")]
    Welcome,
}

impl TriggerKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BirthdayCheck => "birthday.check",
            Self::InactiveClientCheck => "inactive_client.check",
            Self::PromotionBroadcast => "promotion.broadcast",
            Self::Welcome => "welcome",
        }
    }

    #[must_use]
    pub fn automation_kind(self) -> AutomationKind {
        match self {
            Self::BirthdayCheck => AutomationKind::Birthday,
            Self::InactiveClientCheck => AutomationKind::InactiveClient,
            Self::PromotionBroadcast => AutomationKind::Promotion,
            Self::Welcome => AutomationKind::Welcome,
        }
    }

    /// Whether the trigger is a once-per-day scan.
    #[must_use]
    pub fn is_daily(self) -> bool {
        matches!(self, Self::BirthdayCheck | Self::InactiveClientCheck)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "birthday.check" | "birthday" => Ok(Self::BirthdayCheck),
            "inactive_client.check" | "inactive_client" => Ok(Self::InactiveClientCheck),
            "promotion.broadcast" | "promotion" => Ok(Self::PromotionBroadcast),
            "welcome" => Ok(Self::Welcome),
            other => Err(Error::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Outcome of one generator run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(rename = "type")]
    pub kind: TriggerKind,
    /// The daily run had already completed today; nothing was enqueued.
    pub already_completed: bool,
    /// Another run for the same day holds the claim; nothing was enqueued.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub in_progress: bool,
    pub execution_id: Option<String>,
    /// Automations considered.
    pub automations: u64,
    /// Clients examined across all automations.
    pub processed: u64,
    pub enqueued: u64,
    /// Clients without the contact field their bot's platform needs.
    pub skipped: u64,
    /// Rows per insert batch, in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub batches: Vec<usize>,
    /// Automations that could not run (missing bot, inactive bot, ...).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl RunSummary {
    #[must_use]
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            already_completed: false,
            in_progress: false,
            execution_id: None,
            automations: 0,
            processed: 0,
            enqueued: 0,
            skipped: 0,
            batches: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Snapshot answered by `GET` on the automation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerStatus {
    pub day: String,
    pub executions_today: u64,
    pub pending_messages: u64,
}
