use std::{sync::Arc, time::Duration};

use {async_trait::async_trait, serde::Deserialize, tracing::debug};

use {
    courier_channels::{IntegrationLookup, ProfileLookup, active_integration},
    courier_common::Platform,
    courier_store::models::Bot,
};

#[derive(Deserialize)]
struct UserProfile {
    name: Option<String>,
    username: Option<String>,
}

/// Resolves Instagram-scoped user ids to a display name.
pub struct InstagramProfiles {
    api_base: String,
    api_version: String,
    http: reqwest::Client,
    integrations: Arc<dyn IntegrationLookup>,
}

impl InstagramProfiles {
    pub fn new(
        api_base: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
        integrations: Arc<dyn IntegrationLookup>,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            api_base: api_base.into(),
            api_version: api_version.into(),
            http: reqwest::Client::builder().timeout(timeout).build()?,
            integrations,
        })
    }

    async fn fetch(&self, bot: &Bot, user_id: &str) -> Option<UserProfile> {
        let integration =
            active_integration(self.integrations.as_ref(), &bot.owner_id, Platform::Instagram)
                .await
                .ok()?;
        let token = integration.credential("access_token")?;
        let url = format!(
            "{}/{}/{}",
            self.api_base.trim_end_matches('/'),
            self.api_version,
            urlencoding::encode(user_id)
        );
        let resp = self
            .http
            .get(url)
            .query(&[("fields", "name,username")])
            .bearer_auth(token)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            debug!(user_id, status = %resp.status(), "instagram profile lookup failed");
            return None;
        }
        resp.json().await.ok()
    }
}

#[async_trait]
impl ProfileLookup for InstagramProfiles {
    async fn display_name(&self, bot: &Bot, user_id: &str) -> Option<String> {
        let profile = self.fetch(bot, user_id).await?;
        profile
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| profile.username.map(|u| format!("@{u}")))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        courier_store::{IntegrationStore, connect_in_memory, models::Integration},
        mockito::Matcher,
    };

    async fn profiles(server: &mockito::ServerGuard) -> InstagramProfiles {
        let store = IntegrationStore::new(connect_in_memory().await.unwrap());
        store
            .upsert(&Integration {
                owner_id: "o1".into(),
                platform: Platform::Instagram,
                credentials: serde_json::json!({"access_token": "tok"}),
                active: true,
                verified: true,
                updated_at: 0,
            })
            .await
            .unwrap();
        InstagramProfiles::new(server.url(), "v21.0", Duration::from_secs(2), Arc::new(store))
            .unwrap()
    }

    fn bot() -> Bot {
        Bot {
            id: "b1".into(),
            owner_id: "o1".into(),
            name: "Bot".into(),
            platform: Platform::Instagram,
            platform_identifier: Some("1784".into()),
            active: true,
            auto_reply: true,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn prefers_name_then_username() {
        let mut server = mockito::Server::new_async().await;
        let _named = server
            .mock("GET", "/v21.0/u1")
            .match_query(Matcher::UrlEncoded("fields".into(), "name,username".into()))
            .with_body(r#"{"name":"Ana Gómez","username":"anag"}"#)
            .create_async()
            .await;
        let _handle = server
            .mock("GET", "/v21.0/u2")
            .match_query(Matcher::Any)
            .with_body(r#"{"username":"beto"}"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/v21.0/u3")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let lookup = profiles(&server).await;
        assert_eq!(lookup.display_name(&bot(), "u1").await.as_deref(), Some("Ana Gómez"));
        assert_eq!(lookup.display_name(&bot(), "u2").await.as_deref(), Some("@beto"));
        assert_eq!(lookup.display_name(&bot(), "u3").await, None);
    }
}
