//! Instagram messaging webhook payload shapes.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    /// Receiving Instagram account id.
    pub id: String,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<Messaging>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Messaging {
    pub sender: Party,
    pub recipient: Party,
    /// Epoch millis.
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub message: Option<IgMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Party {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IgMessage {
    pub mid: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
}
