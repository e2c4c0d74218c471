use tracing::debug;

use courier_common::time::DAY_MS;

use crate::{
    Result,
    render::TemplateVars,
    schedule::jittered,
    service::{TriggerService, millis},
    types::RunSummary,
};

impl TriggerService {
    /// Clients whose last order (or sign-up) is older than the automation's
    /// window and who have not been contacted by it since.
    pub(crate) async fn scan_inactive(&self, now: i64, summary: &mut RunSummary) -> Result<()> {
        let automations = self
            .business
            .active_automations(summary.kind.automation_kind(), None)
            .await?;

        let mut messages = Vec::new();
        for automation in automations {
            summary.automations += 1;
            let Some(bot) = self.automation_bot(&automation, summary).await? else {
                continue;
            };
            let days = automation
                .config
                .inactive_days
                .unwrap_or(self.settings.default_inactive_days);
            let cutoff = now.saturating_sub(i64::from(days).saturating_mul(DAY_MS));
            let inactive = self
                .business
                .inactive_clients(&automation.owner_id, &automation.id, cutoff)
                .await?;
            debug!(
                automation_id = %automation.id,
                inactive_days = days,
                matches = inactive.len(),
                "inactive client scan"
            );
            if inactive.is_empty() {
                continue;
            }

            let profile = self.profile(&automation.owner_id).await?;
            for entry in &inactive {
                let mut vars = TemplateVars::for_client(&entry.client, &profile, &bot.name);
                let last_seen = entry.last_order_at.unwrap_or(entry.client.created_at);
                vars.insert(
                    "days_inactive",
                    (now.saturating_sub(last_seen) / DAY_MS).to_string(),
                );
                let send_at = jittered(now, millis(self.settings.inactive_jitter));
                if let Some(msg) =
                    Self::compose(&automation, &bot, &entry.client, &vars, send_at, summary)
                {
                    messages.push(msg);
                }
            }
        }
        self.enqueue(messages, summary).await
    }
}
