//! Cloud API webhook payload shapes. Unknown fields are ignored.

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
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<WaMessage>,
    /// Delivery receipts; acknowledged but not ingested.
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub display_phone_number: String,
    pub phone_number_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaMessage {
    pub id: String,
    pub from: String,
    /// Epoch seconds, sent as a string.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub message_type: String,
    pub text: Option<TextBody>,
    pub button: Option<ButtonReply>,
    pub interactive: Option<Interactive>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ButtonReply {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Interactive {
    pub button_reply: Option<InteractiveReply>,
    pub list_reply: Option<InteractiveReply>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractiveReply {
    pub title: String,
}

impl WaMessage {
    /// Text a human typed or tapped, if the message carries any.
    #[must_use]
    pub fn text_body(&self) -> Option<String> {
        match self.message_type.as_str() {
            "text" => self.text.as_ref().map(|t| t.body.clone()),
            "button" => self.button.as_ref().map(|b| b.text.clone()),
            "interactive" => self.interactive.as_ref().and_then(|i| {
                i.button_reply
                    .as_ref()
                    .or(i.list_reply.as_ref())
                    .map(|r| r.title.clone())
            }),
            _ => None,
        }
    }

    /// Provider timestamp in epoch millis.
    #[must_use]
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.timestamp
            .as_deref()
            .and_then(|t| t.parse::<i64>().ok())
            .map(|secs| secs * 1000)
    }
}
