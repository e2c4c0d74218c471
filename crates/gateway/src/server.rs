use {
    axum::{
        Router,
        response::{IntoResponse, Json},
        routing::get,
    },
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use {
    courier_config::CourierConfig,
    courier_store::Stores,
};

use crate::{
    api_routes::api_router, auth_middleware::require_auth, scheduler::spawn_scheduler,
    services::GatewayServices, state::AppState, webhook_routes::webhook_router,
};

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = api_router().layer(axum::middleware::from_fn_with_state(
        state.clone(),
        require_auth,
    ));

    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api", protected)
        .nest("/webhooks", webhook_router());

    #[cfg(feature = "prometheus")]
    let router = if state.config.metrics.prometheus_endpoint {
        router.route(
            "/metrics",
            get(crate::metrics_routes::prometheus_metrics_handler),
        )
    } else {
        router
    };

    #[cfg(feature = "metrics")]
    let router = router.layer(axum::middleware::from_fn(
        crate::metrics_middleware::http_metrics_middleware,
    ));

    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open the database, wire the platform adapters, start the scheduler and
/// serve until the listener fails.
pub async fn start_gateway(config: CourierConfig) -> anyhow::Result<()> {
    let pool = courier_store::connect(&config.database.url, config.database.max_connections).await?;
    let stores = Stores::new(pool);
    let services = GatewayServices::from_config(&config, &stores)?;
    let senders = services.senders.platforms();

    #[cfg(feature = "metrics")]
    let metrics_handle = courier_metrics::init_metrics(courier_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: Vec::new(),
    })?;

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let schedule_enabled = config.schedule.enabled;
    let state = AppState::new(config, stores, services)?;
    #[cfg(feature = "metrics")]
    let state = state.with_metrics(metrics_handle);

    if state.api_token().is_none() {
        tracing::warn!("server.api_token is not set; /api routes are open");
    }
    if schedule_enabled {
        spawn_scheduler(&state)?;
    } else {
        info!("in-process scheduler disabled");
    }

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %listener.local_addr()?,
        platforms = ?senders,
        version = env!("CARGO_PKG_VERSION"),
        "courier gateway listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
