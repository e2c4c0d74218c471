//! Queue Processor: drains due scheduled messages through the platform
//! senders under a wall-clock deadline.

pub mod error;
pub mod processor;
pub mod retry;

pub use {
    error::{Error, Result},
    processor::{ProcessRequest, ProcessSummary, QueueProcessor, QueueSettings, QueueStats},
    retry::next_retry_count,
};
