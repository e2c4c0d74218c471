//! Shared types, error definitions, and utilities used across all courier crates.

pub mod error;
pub mod notify;
pub mod phone;
pub mod time;
pub mod types;

pub use {
    error::{Error, FromMessage, Result},
    notify::{Notification, NotificationKind, NotificationSink},
    types::Platform,
};
