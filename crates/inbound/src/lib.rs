//! Webhook ingestion: route inbound events to a bot, drop duplicates, keep
//! the conversation history, and decide whether and when to auto-reply.

pub mod dedup;
pub mod error;
pub mod ingest;
pub mod responder;
pub mod text;

pub use {
    dedup::{DedupStore, MemoryDedupStore},
    error::{Error, Result},
    ingest::{IngestOutcome, IngestSettings, Ingestor},
    responder::{HttpResponder, Responder, ResponderRequest},
    text::normalize_text,
};
