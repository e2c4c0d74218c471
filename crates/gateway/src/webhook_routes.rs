//! Meta webhook endpoints for WhatsApp and Instagram.
//!
//! `GET` answers the subscription handshake. `POST` verifies the optional
//! signature, flattens the native payload into inbound events, hands each
//! one to its own ingestion task and acknowledges right away.

use std::sync::Arc;

use {
    axum::{
        Router,
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Json, Response},
        routing::get,
    },
    serde::Deserialize,
    serde_json::json,
    tracing::{debug, warn},
};

use {courier_channels::InboundEvent, courier_common::Platform};

use crate::{error::ApiError, state::AppState};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

pub fn webhook_router() -> Router<AppState> {
    Router::new()
        .route(
            "/whatsapp",
            get(subscription_handler).post(whatsapp_events_handler),
        )
        .route(
            "/instagram",
            get(subscription_handler).post(instagram_events_handler),
        )
}

#[derive(Debug, Default, Deserialize)]
struct HubQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Echo `hub.challenge` only when the verify token is a known bot id.
async fn subscription_handler(
    State(state): State<AppState>,
    Query(query): Query<HubQuery>,
) -> Response {
    let Some((token, challenge)) = courier_whatsapp::verify_subscription(
        query.mode.as_deref(),
        query.verify_token.as_deref(),
        query.challenge.as_deref(),
    ) else {
        return StatusCode::FORBIDDEN.into_response();
    };

    match state.ingestor.verify_token(token).await {
        Ok(true) => (StatusCode::OK, challenge.to_string()).into_response(),
        Ok(false) => {
            warn!("webhook handshake with unknown verify token");
            StatusCode::FORBIDDEN.into_response()
        },
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn whatsapp_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = check_signature(&state, &headers, &body) {
        return rejection;
    }
    match serde_json::from_slice::<courier_whatsapp::WebhookPayload>(&body) {
        Ok(payload) => accept(&state, courier_whatsapp::parse_events(&payload)),
        Err(e) => malformed(Platform::Whatsapp, &e),
    }
}

async fn instagram_events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(rejection) = check_signature(&state, &headers, &body) {
        return rejection;
    }
    match serde_json::from_slice::<courier_instagram::WebhookPayload>(&body) {
        Ok(payload) => accept(&state, courier_instagram::parse_events(&payload)),
        Err(e) => malformed(Platform::Instagram, &e),
    }
}

/// Both platforms sign with the same Meta app secret scheme.
fn check_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), Response> {
    let Some(secret) = state.app_secret() else {
        return Ok(());
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if courier_whatsapp::verify_signature(body, signature, secret) {
        Ok(())
    } else {
        warn!("webhook signature rejected");
        Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid signature" })),
        )
            .into_response())
    }
}

fn malformed(platform: Platform, err: &serde_json::Error) -> Response {
    warn!(%platform, error = %err, "malformed webhook payload");
    ApiError::bad_request("malformed payload").into_response()
}

fn accept(state: &AppState, events: Vec<InboundEvent>) -> Response {
    let received = events.len();
    for event in events {
        let ingestor = Arc::clone(&state.ingestor);
        tokio::spawn(async move {
            match ingestor.ingest(&event).await {
                Ok(outcome) => debug!(
                    platform = %event.platform,
                    sender = %event.sender_id,
                    outcome = outcome.as_str(),
                    "inbound event handled"
                ),
                Err(e) => warn!(
                    platform = %event.platform,
                    sender = %event.sender_id,
                    error = %e,
                    "inbound event failed"
                ),
            }
        });
    }
    (StatusCode::OK, Json(json!({ "received": received }))).into_response()
}
