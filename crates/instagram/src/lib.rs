//! Instagram messaging: outbound sender with a secondary endpoint, profile
//! lookup for display names, and webhook payload parsing.

pub mod profile;
pub mod sender;
pub mod types;
pub mod webhook;

pub use {
    profile::InstagramProfiles,
    sender::{InstagramSender, InstagramSenderConfig},
    types::WebhookPayload,
    webhook::parse_events,
};
