#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::net::SocketAddr;

use tokio::net::TcpListener;

use {
    courier_common::Platform,
    courier_config::CourierConfig,
    courier_gateway::{AppState, GatewayServices, build_app},
    courier_store::{Stores, connect_in_memory, models::Bot},
};

pub struct TestServer {
    pub addr: SocketAddr,
    pub stores: Stores,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

/// Config tuned for tests: no debounce, no scheduler.
pub fn test_config() -> CourierConfig {
    let mut config = CourierConfig::default();
    config.inbound.debounce_secs = 0;
    config.schedule.enabled = false;
    config
}

pub async fn start_server(config: CourierConfig) -> TestServer {
    let stores = Stores::new(connect_in_memory().await.unwrap());
    let state = AppState::new(config, stores.clone(), GatewayServices::noop()).unwrap();
    let app = build_app(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer { addr, stores }
}

pub async fn add_bot(stores: &Stores, id: &str, platform: Platform, identifier: &str) {
    stores
        .business
        .insert_bot(&Bot {
            id: id.into(),
            owner_id: "o1".into(),
            name: "Sol Bot".into(),
            platform,
            platform_identifier: Some(identifier.into()),
            active: true,
            auto_reply: true,
            created_at: 0,
        })
        .await
        .unwrap();
}
