use tracing::info;

use crate::{
    Error, Result,
    render::TemplateVars,
    service::{TriggerService, millis},
    types::{RunSummary, TriggerKind},
};

impl TriggerService {
    /// One welcome message per active welcome automation of the client's
    /// owner, sent after a short delay.
    pub(crate) async fn welcome_client(&self, client_id: &str) -> Result<RunSummary> {
        let mut summary = RunSummary::new(TriggerKind::Welcome);
        let client = self
            .business
            .get_client(client_id)
            .await?
            .ok_or_else(|| Error::not_found("client", client_id))?;
        let automations = self
            .business
            .active_automations(summary.kind.automation_kind(), Some(&client.owner_id))
            .await?;

        let send_at = self.now() + millis(self.settings.welcome_delay);
        let profile = self.profile(&client.owner_id).await?;
        let mut messages = Vec::new();
        for automation in &automations {
            summary.automations += 1;
            let Some(bot) = self.automation_bot(automation, &mut summary).await? else {
                continue;
            };
            let vars = TemplateVars::for_client(&client, &profile, &bot.name);
            if let Some(msg) = Self::compose(automation, &bot, &client, &vars, send_at, &mut summary)
            {
                messages.push(msg);
            }
        }
        self.enqueue(messages, &mut summary).await?;
        info!(client_id, enqueued = summary.enqueued, "welcome messages queued");
        Ok(summary)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        crate::{Error, service::testing::*},
        courier_common::Platform,
        courier_store::models::{AutomationConfig, AutomationKind},
    };

    #[tokio::test]
    async fn welcomes_new_client_after_delay() {
        let h = harness().await;
        add_bot(&h.stores, "b1", Platform::Whatsapp).await;
        add_bot(&h.stores, "b2", Platform::Email).await;
        add_automation(
            &h.stores,
            "a1",
            "b1",
            AutomationKind::Welcome,
            "¡Bienvenida {first_name} a {business_name}!",
            AutomationConfig::default(),
        )
        .await;
        add_automation(
            &h.stores,
            "a2",
            "b2",
            AutomationKind::Welcome,
            "Gracias por sumarte",
            AutomationConfig::default(),
        )
        .await;
        h.stores
            .business
            .insert_client(&client("c1", "Ana", Some("5492611234567"), NOON))
            .await
            .unwrap();

        let summary = h.service.client_created("c1").await.unwrap();
        assert_eq!(summary.automations, 2);
        assert_eq!(summary.enqueued, 1);
        assert_eq!(summary.skipped, 1);

        let queued = h.stores.scheduled.list_by_owner("o1").await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].content, "¡Bienvenida Ana a Panadería Sol!");
        assert_eq!(queued[0].scheduled_for, NOON + 120_000);
        let audit = h.stores.audit.list_for_message(&queued[0].id).await.unwrap();
        assert_eq!(audit.len(), 1);
    }

    #[tokio::test]
    async fn unknown_client() {
        let h = harness().await;
        assert!(matches!(
            h.service.client_created("ghost").await,
            Err(Error::NotFound { entity: "client", .. })
        ));
    }
}
