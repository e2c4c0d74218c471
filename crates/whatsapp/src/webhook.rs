//! WhatsApp webhook handling.

use std::collections::HashMap;

use {
    hmac::{Hmac, Mac},
    sha2::Sha256,
    tracing::{debug, warn},
};

use {courier_channels::InboundEvent, courier_common::Platform};

use crate::types::WebhookPayload;

type HmacSha256 = Hmac<Sha256>;

/// Verify the webhook signature from Meta.
///
/// The signature is sent in the `X-Hub-Signature-256` header as `sha256=<hex>`.
pub fn verify_signature(body: &[u8], signature_header: &str, app_secret: &str) -> bool {
    let expected = match signature_header.strip_prefix("sha256=") {
        Some(hex) => hex,
        None => {
            warn!("invalid signature header format (missing sha256= prefix)");
            return false;
        },
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => {
            warn!("failed to create HMAC");
            return false;
        },
    };

    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&computed, &expected.to_ascii_lowercase())
}

/// Constant-time string comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check the GET handshake shape.
///
/// Meta sends `hub.mode=subscribe`, `hub.verify_token` and `hub.challenge`.
/// Returns `(token, challenge)` when the request is a subscription attempt;
/// the caller decides whether the token is acceptable.
pub fn verify_subscription<'a>(
    mode: Option<&'a str>,
    token: Option<&'a str>,
    challenge: Option<&'a str>,
) -> Option<(&'a str, &'a str)> {
    let mode = mode?;
    let token = token.filter(|t| !t.is_empty())?;
    let challenge = challenge?;
    (mode == "subscribe").then_some((token, challenge))
}

/// Flatten a webhook payload into inbound text events.
///
/// Only `messages` changes are considered. Status receipts and messages
/// without text (media, reactions) are skipped.
pub fn parse_events(payload: &WebhookPayload) -> Vec<InboundEvent> {
    let mut events = Vec::new();

    for entry in &payload.entry {
        for change in &entry.changes {
            if change.field != "messages" {
                debug!(field = %change.field, "ignoring non-message webhook change");
                continue;
            }
            let value = &change.value;
            let Some(metadata) = value.metadata.as_ref() else {
                warn!(entry_id = %entry.id, "webhook change without metadata");
                continue;
            };

            let contacts: HashMap<&str, &str> = value
                .contacts
                .iter()
                .filter_map(|c| c.profile.as_ref().map(|p| (c.wa_id.as_str(), p.name.as_str())))
                .collect();

            for msg in &value.messages {
                let Some(text) = msg.text_body().filter(|t| !t.trim().is_empty()) else {
                    debug!(msg_type = %msg.message_type, "ignoring non-text message");
                    continue;
                };
                events.push(InboundEvent {
                    platform: Platform::Whatsapp,
                    account_id: metadata.phone_number_id.clone(),
                    sender_id: msg.from.clone(),
                    sender_name: contacts.get(msg.from.as_str()).map(|n| n.to_string()),
                    text,
                    provider_message_id: Some(msg.id.clone()),
                    timestamp_ms: msg.timestamp_ms(),
                });
            }
        }
    }
    events
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn signature_valid_and_invalid() {
        let body = b"{\"object\":\"whatsapp_business_account\"}";
        let header = sign(body, "app_secret");
        assert!(verify_signature(body, &header, "app_secret"));
        assert!(verify_signature(body, &header.to_uppercase().replacen("SHA256=", "sha256=", 1), "app_secret"));
        assert!(!verify_signature(body, &header, "other_secret"));
        assert!(!verify_signature(
            body,
            "sha256=0000000000000000000000000000000000000000000000000000000000000000",
            "app_secret"
        ));
        assert!(!verify_signature(body, "invalid_format", "app_secret"));
    }

    #[test]
    fn subscription_requires_subscribe_mode() {
        assert_eq!(
            verify_subscription(Some("subscribe"), Some("bot-1"), Some("123")),
            Some(("bot-1", "123"))
        );
        assert_eq!(verify_subscription(Some("unsubscribe"), Some("bot-1"), Some("123")), None);
        assert_eq!(verify_subscription(Some("subscribe"), Some(""), Some("123")), None);
        assert_eq!(verify_subscription(Some("subscribe"), Some("bot-1"), None), None);
    }

    #[test]
    fn constant_time_eq_cases() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }

    #[test]
    fn parses_text_button_and_skips_statuses() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "54261", "phone_number_id": "PNID"},
                        "contacts": [{"wa_id": "5492611234567", "profile": {"name": "Ana"}}],
                        "messages": [
                            {"id": "wamid.1", "from": "5492611234567", "timestamp": "1700000000",
                             "type": "text", "text": {"body": "hola"}},
                            {"id": "wamid.2", "from": "5492611234567", "timestamp": "1700000001",
                             "type": "image", "image": {"id": "media"}},
                            {"id": "wamid.3", "from": "5493510000000",
                             "type": "button", "button": {"text": "Quiero", "payload": "x"}}
                        ]
                    }
                }, {
                    "field": "messages",
                    "value": {
                        "metadata": {"phone_number_id": "PNID"},
                        "statuses": [{"id": "wamid.0", "status": "delivered"}]
                    }
                }]
            }]
        }))
        .unwrap();

        let events = parse_events(&payload);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].account_id, "PNID");
        assert_eq!(events[0].sender_name.as_deref(), Some("Ana"));
        assert_eq!(events[0].text, "hola");
        assert_eq!(events[0].provider_message_id.as_deref(), Some("wamid.1"));
        assert_eq!(events[0].timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(events[1].text, "Quiero");
        assert_eq!(events[1].sender_name, None);
    }
}
