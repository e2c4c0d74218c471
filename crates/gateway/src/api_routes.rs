//! Token-protected `/api` routes: queue trigger, automation trigger and
//! domain events.

use std::sync::Arc;

use {
    axum::{
        Router,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    serde::Deserialize,
    serde_json::json,
    tracing::{error, info},
};

use {
    courier_queue::{ProcessRequest, ProcessSummary, QueueStats},
    courier_triggers::{RunSummary, TriggerKind, TriggerStatus},
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/queue/process",
            get(queue_stats_handler).post(queue_process_handler),
        )
        .route(
            "/automations/run",
            get(automation_status_handler).post(automation_run_handler),
        )
        .route("/events/promotion-created", post(promotion_created_handler))
        .route("/events/client-created", post(client_created_handler))
}

// ── Queue ────────────────────────────────────────────────────────────────────

async fn queue_process_handler(
    State(state): State<AppState>,
    body: Option<Json<ProcessRequest>>,
) -> ApiResult<Json<ProcessSummary>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let summary = state.queue.process(&request).await?;
    Ok(Json(summary))
}

async fn queue_stats_handler(State(state): State<AppState>) -> ApiResult<Json<QueueStats>> {
    Ok(Json(state.queue.stats().await?))
}

// ── Automations ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RunRequest {
    #[serde(rename = "type")]
    kind: String,
    promotion_id: Option<String>,
    client_id: Option<String>,
}

async fn automation_run_handler(
    State(state): State<AppState>,
    Json(body): Json<RunRequest>,
) -> ApiResult<Json<RunSummary>> {
    let kind: TriggerKind = body.kind.parse()?;
    let target = match kind {
        TriggerKind::PromotionBroadcast => body.promotion_id.as_deref(),
        TriggerKind::Welcome => body.client_id.as_deref(),
        TriggerKind::BirthdayCheck | TriggerKind::InactiveClientCheck => None,
    };
    let summary = state.triggers.run(kind, target).await?;
    Ok(Json(summary))
}

async fn automation_status_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<TriggerStatus>> {
    Ok(Json(state.triggers.status().await?))
}

// ── Domain events ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PromotionCreated {
    promotion_id: String,
}

/// Accepts the event and broadcasts in the background once the settle delay
/// has passed.
async fn promotion_created_handler(
    State(state): State<AppState>,
    Json(body): Json<PromotionCreated>,
) -> ApiResult<impl IntoResponse> {
    let promotion_id = body.promotion_id.trim().to_string();
    if promotion_id.is_empty() {
        return Err(ApiError::bad_request("promotion_id is required"));
    }

    let triggers = Arc::clone(&state.triggers);
    let id = promotion_id.clone();
    tokio::spawn(async move {
        match triggers.promotion_created(&id).await {
            Ok(summary) => info!(
                promotion_id = %id,
                enqueued = summary.enqueued,
                "promotion event handled"
            ),
            Err(e) => error!(promotion_id = %id, error = %e, "promotion event failed"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "accepted", "promotion_id": promotion_id })),
    ))
}

#[derive(Debug, Deserialize)]
struct ClientCreated {
    client_id: String,
}

async fn client_created_handler(
    State(state): State<AppState>,
    Json(body): Json<ClientCreated>,
) -> ApiResult<Json<RunSummary>> {
    let client_id = body.client_id.trim();
    if client_id.is_empty() {
        return Err(ApiError::bad_request("client_id is required"));
    }
    Ok(Json(state.triggers.client_created(client_id).await?))
}
