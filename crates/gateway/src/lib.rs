//! Gateway: the HTTP surface of the platform and its in-process scheduler.
//!
//! Lifecycle:
//! 1. Load + validate config
//! 2. Open the database and run migrations
//! 3. Wire platform senders, the responder client and profile lookups
//! 4. Start the queue and daily-check timer loops
//! 5. Serve `/health`, `/api/*`, `/webhooks/*` and `/metrics`
//!
//! Domain logic lives in the queue, trigger and inbound crates; handlers here
//! only parse requests and map results onto HTTP.

pub mod api_routes;
pub mod auth_middleware;
pub mod error;
#[cfg(feature = "metrics")]
pub mod metrics_middleware;
#[cfg(feature = "prometheus")]
pub mod metrics_routes;
pub mod scheduler;
pub mod server;
pub mod services;
pub mod state;
pub mod webhook_routes;

pub use {
    error::{ApiError, ApiResult},
    server::{build_app, start_gateway},
    services::GatewayServices,
    state::AppState,
};
