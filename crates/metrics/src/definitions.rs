//! Metric name and label definitions.
//!
//! This module defines all metric names and common label keys used throughout courier.
//! Centralizing these definitions ensures consistency and makes it easier to document
//! what metrics are available.

/// HTTP request metrics
pub mod http {
    /// Total HTTP requests handled
    pub const REQUESTS_TOTAL: &str = "courier_http_requests_total";
    /// HTTP request duration in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "courier_http_request_duration_seconds";
}

/// Outbound queue metrics
pub mod queue {
    /// Queue Processor invocations
    pub const INVOCATIONS_TOTAL: &str = "courier_queue_invocations_total";
    /// Wall-clock duration of one invocation
    pub const INVOCATION_DURATION_SECONDS: &str = "courier_queue_invocation_duration_seconds";
    /// Rows claimed for dispatch
    pub const MESSAGES_CLAIMED_TOTAL: &str = "courier_queue_messages_claimed_total";
    /// Successful dispatches by platform
    pub const MESSAGES_SENT_TOTAL: &str = "courier_queue_messages_sent_total";
    /// Failed dispatches by platform
    pub const MESSAGES_FAILED_TOTAL: &str = "courier_queue_messages_failed_total";
    /// Messages that exhausted their retry budget
    pub const MESSAGES_EXHAUSTED_TOTAL: &str = "courier_queue_messages_exhausted_total";
    /// Rows returned to pending after a stale claim
    pub const STALE_CLAIMS_RELEASED_TOTAL: &str = "courier_queue_stale_claims_released_total";
    /// Eligible rows left after the last invocation
    pub const REMAINING: &str = "courier_queue_remaining";
}

/// Dispatch adapter metrics
pub mod dispatch {
    /// Provider calls by platform and outcome
    pub const REQUESTS_TOTAL: &str = "courier_dispatch_requests_total";
    /// Provider call duration in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "courier_dispatch_request_duration_seconds";
    /// Instagram sends that needed the fallback endpoint
    pub const FALLBACK_TOTAL: &str = "courier_dispatch_fallback_total";
}

/// Trigger generator metrics
pub mod triggers {
    /// Generator runs by kind
    pub const RUNS_TOTAL: &str = "courier_trigger_runs_total";
    /// Runs skipped because today's execution already completed
    pub const RUNS_SKIPPED_TOTAL: &str = "courier_trigger_runs_skipped_total";
    /// Messages enqueued by kind
    pub const MESSAGES_ENQUEUED_TOTAL: &str = "courier_trigger_messages_enqueued_total";
    /// Clients skipped for lacking a contact field
    pub const CLIENTS_SKIPPED_TOTAL: &str = "courier_trigger_clients_skipped_total";
    /// Generator errors by kind
    pub const ERRORS_TOTAL: &str = "courier_trigger_errors_total";
}

/// Inbound webhook metrics
pub mod inbound {
    /// Webhook events received by platform
    pub const EVENTS_RECEIVED_TOTAL: &str = "courier_inbound_events_received_total";
    /// Events dropped as duplicates
    pub const EVENTS_DUPLICATE_TOTAL: &str = "courier_inbound_events_duplicate_total";
    /// Events addressed to no known bot
    pub const EVENTS_UNROUTED_TOTAL: &str = "courier_inbound_events_unrouted_total";
    /// Automated replies sent
    pub const REPLIES_SENT_TOTAL: &str = "courier_inbound_replies_sent_total";
    /// Replies skipped because a newer message arrived during the debounce window
    pub const REPLIES_SUPERSEDED_TOTAL: &str = "courier_inbound_replies_superseded_total";
    /// Replies skipped because the conversation is paused
    pub const REPLIES_PAUSED_TOTAL: &str = "courier_inbound_replies_paused_total";
    /// Responder call duration in seconds
    pub const RESPONDER_DURATION_SECONDS: &str = "courier_inbound_responder_duration_seconds";
    /// Responder failures
    pub const RESPONDER_ERRORS_TOTAL: &str = "courier_inbound_responder_errors_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const ENDPOINT: &str = "endpoint";
    pub const METHOD: &str = "method";
    pub const STATUS: &str = "status";
    pub const PLATFORM: &str = "platform";
    pub const PROVIDER: &str = "provider";
    pub const KIND: &str = "kind";
    pub const OUTCOME: &str = "outcome";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    /// HTTP request duration buckets (in seconds)
    /// Covers 1ms to 60s
    pub const HTTP_DURATION: &[f64] = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    /// Provider call duration buckets (in seconds)
    /// Covers 10ms to the 10s outbound timeout plus slack
    pub const DISPATCH_DURATION: &[f64] = &[
        0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0,
    ];

    /// Queue invocation duration buckets (in seconds)
    /// Covers 100ms to the 55s deadline plus one chunk
    pub const INVOCATION_DURATION: &[f64] = &[
        0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 55.0, 70.0,
    ];
}
