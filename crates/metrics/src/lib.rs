//! Metrics collection and export for courier.
//!
//! Metric names are defined here so every crate records under the same
//! keys. Crates record through the `metrics` facade behind their own optional
//! `metrics` feature; when the `prometheus` feature is enabled here the
//! gateway renders the collected values on `/metrics`.
//!
//! ```rust,ignore
//! use courier_metrics::{counter, queue};
//!
//! counter!(queue::MESSAGES_SENT_TOTAL, "platform" => "whatsapp").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
