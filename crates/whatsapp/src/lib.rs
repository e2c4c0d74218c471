//! WhatsApp Cloud API adapter.
//!
//! Outbound: [`WhatsAppSender`] sends free text or approved templates with
//! the owner's stored credentials. Inbound: [`webhook`] verifies handshakes
//! and signatures and flattens the `entry[].changes[]` payload into
//! [`courier_channels::InboundEvent`]s.

pub mod payload;
pub mod sender;
pub mod types;
pub mod webhook;

pub use {
    sender::{WhatsAppSender, WhatsAppSenderConfig},
    types::WebhookPayload,
    webhook::{parse_events, verify_signature, verify_subscription},
};
