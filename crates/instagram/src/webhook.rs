use tracing::debug;

use {courier_channels::InboundEvent, courier_common::Platform};

use crate::types::WebhookPayload;

/// Flatten `entry[].messaging[]` into inbound text events.
///
/// Echoes of our own sends and events without text are dropped.
pub fn parse_events(payload: &WebhookPayload) -> Vec<InboundEvent> {
    let mut events = Vec::new();
    for entry in &payload.entry {
        for item in &entry.messaging {
            let Some(message) = item.message.as_ref() else {
                continue;
            };
            if message.is_echo || item.sender.id == entry.id {
                debug!(account_id = %entry.id, "ignoring echo");
                continue;
            }
            let Some(text) = message.text.as_deref().filter(|t| !t.trim().is_empty()) else {
                debug!(account_id = %entry.id, "ignoring non-text message");
                continue;
            };
            events.push(InboundEvent {
                platform: Platform::Instagram,
                account_id: entry.id.clone(),
                sender_id: item.sender.id.clone(),
                sender_name: None,
                text: text.to_string(),
                provider_message_id: message.mid.clone(),
                timestamp_ms: item.timestamp.or(entry.time),
            });
        }
    }
    events
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_echoes_and_attachments() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "object": "instagram",
            "entry": [{
                "id": "1784",
                "time": 1700000000000i64,
                "messaging": [
                    {"sender": {"id": "u1"}, "recipient": {"id": "1784"}, "timestamp": 1700000000123i64,
                     "message": {"mid": "m1", "text": "Hola"}},
                    {"sender": {"id": "1784"}, "recipient": {"id": "u1"},
                     "message": {"mid": "m2", "text": "Respuesta", "is_echo": true}},
                    {"sender": {"id": "u1"}, "recipient": {"id": "1784"},
                     "message": {"mid": "m3", "attachments": [{"type": "image"}]}},
                    {"sender": {"id": "u1"}, "recipient": {"id": "1784"},
                     "read": {"mid": "m1"}}
                ]
            }]
        }))
        .unwrap();

        let events = parse_events(&payload);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.account_id, "1784");
        assert_eq!(event.sender_id, "u1");
        assert_eq!(event.text, "Hola");
        assert_eq!(event.provider_message_id.as_deref(), Some("m1"));
        assert_eq!(event.timestamp_ms, Some(1_700_000_000_123));
    }
}
