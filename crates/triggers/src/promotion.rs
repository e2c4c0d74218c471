use tracing::info;

use courier_common::time::HOUR_MS;

use crate::{
    Error, Result,
    render::TemplateVars,
    service::{TriggerService, millis},
    types::{RunSummary, TriggerKind},
};

impl TriggerService {
    /// Queue a promotion to every client of its owner reachable through a
    /// matching promotion automation. Sends are spaced so the provider sees a
    /// steady trickle rather than a burst.
    pub(crate) async fn broadcast_promotion(&self, promotion_id: &str) -> Result<RunSummary> {
        let mut summary = RunSummary::new(TriggerKind::PromotionBroadcast);
        let promotion = self
            .business
            .get_promotion(promotion_id)
            .await?
            .ok_or_else(|| Error::not_found("promotion", promotion_id))?;

        let automations: Vec<_> = self
            .business
            .active_automations(summary.kind.automation_kind(), Some(&promotion.owner_id))
            .await?
            .into_iter()
            .filter(|a| {
                a.config
                    .promotion_id
                    .as_deref()
                    .is_none_or(|id| id == promotion.id)
            })
            .collect();
        if automations.is_empty() {
            info!(promotion_id, owner_id = %promotion.owner_id, "no promotion automation matches");
            return Ok(summary);
        }

        let now = self.now();
        let clients = self.business.list_clients(&promotion.owner_id).await?;
        let profile = self.profile(&promotion.owner_id).await?;
        let spacing = millis(self.settings.promotion_spacing);

        let mut messages = Vec::new();
        for automation in &automations {
            summary.automations += 1;
            let Some(bot) = self.automation_bot(automation, &mut summary).await? else {
                continue;
            };
            let base = match automation.config.delay_hours {
                Some(hours) if hours > 0.0 => now + (hours * HOUR_MS as f64).round() as i64,
                _ => now + millis(self.settings.promotion_immediate_delay),
            };
            for client in &clients {
                let vars = TemplateVars::for_client(client, &profile, &bot.name)
                    .with_promotion(&promotion);
                let slot = i64::try_from(messages.len()).unwrap_or(i64::MAX);
                let send_at = base.saturating_add(slot.saturating_mul(spacing));
                if let Some(msg) =
                    Self::compose(automation, &bot, client, &vars, send_at, &mut summary)
                {
                    messages.push(msg);
                }
            }
        }

        self.enqueue(messages, &mut summary).await?;
        info!(
            promotion_id,
            enqueued = summary.enqueued,
            skipped = summary.skipped,
            batches = summary.batches.len(),
            "promotion broadcast queued"
        );
        Ok(summary)
    }
}
