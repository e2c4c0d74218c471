//! Integration tests for the `/api` routes and the bearer-token middleware.
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use {
    common::{start_server, test_config},
    reqwest::StatusCode,
    serde_json::{Value, json},
};

#[tokio::test]
async fn health_is_public() {
    let mut config = test_config();
    config.server.api_token = Some("s3cret".into());
    let server = start_server(config).await;

    let resp = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn api_requires_bearer_token_when_configured() {
    let mut config = test_config();
    config.server.api_token = Some("s3cret".into());
    let server = start_server(config).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(server.url("/api/queue/process"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "not authenticated");

    let resp = client
        .get(server.url("/api/queue/process"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .get(server.url("/api/queue/process"))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn queue_stats_and_empty_run() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();

    let stats: Value = client
        .get(server.url("/api/queue/process"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total"], 0);
    assert!(stats["by_status"].is_object());
    assert!(stats["timestamp"].is_i64());

    // Cron callers post without a body.
    let resp = client
        .post(server.url("/api/queue/process"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let summary: Value = resp.json().await.unwrap();
    assert_eq!(summary["processed"], 0);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["remaining"], 0);

    let resp = client
        .post(server.url("/api/queue/process"))
        .json(&json!({"batch_size": 10, "owner": "o1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn automation_run_and_status() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/api/automations/run"))
        .json(&json!({"type": "birthday.check"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let summary: Value = resp.json().await.unwrap();
    assert_eq!(summary["type"], "birthday.check");
    assert_eq!(summary["already_completed"], false);

    // Second run the same day is a no-op.
    let summary: Value = client
        .post(server.url("/api/automations/run"))
        .json(&json!({"type": "birthday.check"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["already_completed"], true);

    let status: Value = client
        .get(server.url("/api/automations/run"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["executions_today"], 1);
    assert_eq!(status["pending_messages"], 0);
}

#[tokio::test]
async fn automation_run_rejects_bad_requests() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/api/automations/run"))
        .json(&json!({"type": "anniversary.check"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(server.url("/api/automations/run"))
        .json(&json!({"type": "promotion.broadcast"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "promotion_id is required");

    let resp = client
        .post(server.url("/api/automations/run"))
        .json(&json!({"type": "promotion.broadcast", "promotion_id": "ghost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn domain_events() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/api/events/promotion-created"))
        .json(&json!({"promotion_id": "p1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let resp = client
        .post(server.url("/api/events/promotion-created"))
        .json(&json!({"promotion_id": "  "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(server.url("/api/events/client-created"))
        .json(&json!({"client_id": "ghost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
