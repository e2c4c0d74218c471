//! Trigger generators: scan business data and enqueue scheduled messages.
//!
//! Birthday and inactive-client checks run once per calendar day, guarded by
//! an automation execution record. Promotion broadcasts and welcome messages
//! are driven by domain events.

pub mod error;
pub mod render;
pub mod schedule;
pub mod service;
pub mod types;

mod birthday;
mod inactive;
mod promotion;
mod welcome;

pub use {
    error::{Error, Result},
    schedule::{jittered, next_fire},
    service::{TriggerService, TriggerSettings},
    types::{RunSummary, TriggerKind, TriggerStatus},
};
