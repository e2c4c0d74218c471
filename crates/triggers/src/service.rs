//! Trigger entry points and the plumbing shared by every generator.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use {
    chrono_tz::Tz,
    tracing::{error, info, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, labels, triggers as trigger_metrics};

use {
    courier_common::{
        Notification, NotificationKind, NotificationSink,
        time::{ClockFn, day_key, parse_timezone, system_clock},
    },
    courier_config::CourierConfig,
    courier_store::{
        AuditLog, BusinessStore, ExecutionStore, ScheduledMessageStore, Stores,
        executions::ExecutionCounts,
        models::{
            AuditEntry, Automation, Bot, BusinessProfile, Client, DEFAULT_PRIORITY, LogStatus,
            NewScheduledMessage,
        },
    },
};

use crate::{
    Error, Result,
    error::Context,
    render::{TemplateVars, message_metadata, render},
    types::{RunSummary, TriggerKind, TriggerStatus},
};

/// Tuning for the generators.
#[derive(Debug, Clone)]
pub struct TriggerSettings {
    /// Defines "today" for the daily checks.
    pub timezone: Tz,
    pub birthday_jitter: Duration,
    pub inactive_jitter: Duration,
    pub default_inactive_days: u32,
    /// Wait after a promotion is created so its row is committed.
    pub promotion_settle: Duration,
    pub promotion_immediate_delay: Duration,
    pub promotion_spacing: Duration,
    pub insert_batch_size: usize,
    pub welcome_delay: Duration,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            birthday_jitter: Duration::from_secs(60 * 60),
            inactive_jitter: Duration::from_secs(4 * 60 * 60),
            default_inactive_days: 30,
            promotion_settle: Duration::from_secs(3),
            promotion_immediate_delay: Duration::from_secs(60),
            promotion_spacing: Duration::from_secs(5),
            insert_batch_size: 100,
            welcome_delay: Duration::from_secs(120),
        }
    }
}

impl TriggerSettings {
    pub fn from_config(config: &CourierConfig) -> Result<Self> {
        let t = &config.triggers;
        Ok(Self {
            timezone: parse_timezone(&t.timezone)?,
            birthday_jitter: Duration::from_secs(u64::from(t.birthday_jitter_minutes) * 60),
            inactive_jitter: Duration::from_secs(u64::from(t.inactive_jitter_hours) * 60 * 60),
            default_inactive_days: t.default_inactive_days,
            promotion_settle: Duration::from_secs(t.promotion_settle_secs),
            promotion_immediate_delay: Duration::from_secs(t.promotion_immediate_delay_secs),
            promotion_spacing: Duration::from_secs(t.promotion_spacing_secs),
            insert_batch_size: t.insert_batch_size.max(1),
            welcome_delay: Duration::from_secs(t.welcome_delay_secs),
        })
    }
}

pub(crate) fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

pub struct TriggerService {
    pub(crate) settings: TriggerSettings,
    pub(crate) business: BusinessStore,
    pub(crate) scheduled: ScheduledMessageStore,
    pub(crate) executions: ExecutionStore,
    pub(crate) audit: AuditLog,
    notifier: Arc<dyn NotificationSink>,
    clock: ClockFn,
}

impl TriggerService {
    pub fn new(
        stores: &Stores,
        notifier: Arc<dyn NotificationSink>,
        settings: TriggerSettings,
    ) -> Self {
        Self {
            settings,
            business: stores.business.clone(),
            scheduled: stores.scheduled.clone(),
            executions: stores.executions.clone(),
            audit: stores.audit.clone(),
            notifier,
            clock: system_clock(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: ClockFn) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &TriggerSettings {
        &self.settings
    }

    pub(crate) fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Run one trigger. Promotion broadcasts take a promotion id and welcome
    /// messages a client id as `target`.
    pub async fn run(&self, kind: TriggerKind, target: Option<&str>) -> Result<RunSummary> {
        let result = match kind {
            TriggerKind::BirthdayCheck | TriggerKind::InactiveClientCheck => {
                self.run_daily(kind).await
            },
            TriggerKind::PromotionBroadcast => {
                let id = target.context("promotion_id is required")?;
                self.broadcast_promotion(id).await
            },
            TriggerKind::Welcome => {
                let id = target.context("client_id is required")?;
                self.welcome_client(id).await
            },
        };
        #[cfg(feature = "metrics")]
        {
            match &result {
                Ok(summary) => {
                    counter!(trigger_metrics::RUNS_TOTAL, labels::KIND => kind.as_str())
                        .increment(1);
                    if summary.already_completed {
                        counter!(trigger_metrics::RUNS_SKIPPED_TOTAL, labels::KIND => kind.as_str())
                            .increment(1);
                    }
                    counter!(
                        trigger_metrics::MESSAGES_ENQUEUED_TOTAL,
                        labels::KIND => kind.as_str()
                    )
                    .increment(summary.enqueued);
                    counter!(
                        trigger_metrics::CLIENTS_SKIPPED_TOTAL,
                        labels::KIND => kind.as_str()
                    )
                    .increment(summary.skipped);
                },
                Err(_) => {
                    counter!(trigger_metrics::ERRORS_TOTAL, labels::KIND => kind.as_str())
                        .increment(1);
                },
            }
        }
        result
    }

    /// Birthday and inactive-client checks, one after the other. A failing
    /// check is logged and does not stop the next.
    pub async fn run_daily_checks(&self) -> Vec<RunSummary> {
        let mut out = Vec::with_capacity(2);
        for kind in [TriggerKind::BirthdayCheck, TriggerKind::InactiveClientCheck] {
            match self.run(kind, None).await {
                Ok(summary) => out.push(summary),
                Err(e) => error!(kind = %kind, error = %e, "daily check failed"),
            }
        }
        out
    }

    /// A promotion was just created: wait for the row to settle, then
    /// broadcast it.
    pub async fn promotion_created(&self, promotion_id: &str) -> Result<RunSummary> {
        tokio::time::sleep(self.settings.promotion_settle).await;
        self.run(TriggerKind::PromotionBroadcast, Some(promotion_id))
            .await
    }

    /// A client was just created.
    pub async fn client_created(&self, client_id: &str) -> Result<RunSummary> {
        self.run(TriggerKind::Welcome, Some(client_id)).await
    }

    pub async fn status(&self) -> Result<TriggerStatus> {
        let day = day_key(self.now(), self.settings.timezone);
        Ok(TriggerStatus {
            executions_today: self.executions.count_for_day(&day).await?,
            pending_messages: self.scheduled.count_pending().await?,
            day,
        })
    }

    /// Once-per-day wrapper around a scan. A completed execution for today
    /// short-circuits; a failed scan marks the execution failed so a later
    /// invocation retries it.
    async fn run_daily(&self, kind: TriggerKind) -> Result<RunSummary> {
        let now = self.now();
        let day = day_key(now, self.settings.timezone);
        let mut summary = RunSummary::new(kind);

        if let Some(done) = self
            .executions
            .find_completed(kind.automation_kind(), &day)
            .await?
        {
            info!(kind = %kind, day, execution_id = %done.id, "daily check already completed");
            summary.already_completed = true;
            summary.execution_id = Some(done.id);
            return Ok(summary);
        }

        let Some(execution_id) = self
            .executions
            .start(kind.automation_kind(), &day, now)
            .await?
        else {
            // Lost the claim: either a concurrent run finished first or one is
            // still running.
            match self
                .executions
                .find_completed(kind.automation_kind(), &day)
                .await?
            {
                Some(done) => {
                    summary.already_completed = true;
                    summary.execution_id = Some(done.id);
                },
                None => summary.in_progress = true,
            }
            info!(kind = %kind, day, in_progress = summary.in_progress, "daily check claimed elsewhere");
            return Ok(summary);
        };
        summary.execution_id = Some(execution_id.clone());

        let scanned = match kind {
            TriggerKind::BirthdayCheck => self.scan_birthdays(now, &mut summary).await,
            TriggerKind::InactiveClientCheck => self.scan_inactive(now, &mut summary).await,
            other => Err(Error::message(format!("{other} is not a daily check"))),
        };

        let finished = self.now();
        match scanned {
            Ok(()) => {
                let counts = ExecutionCounts {
                    processed: summary.processed,
                    enqueued: summary.enqueued,
                    skipped: summary.skipped,
                };
                self.executions
                    .complete(&execution_id, counts, finished)
                    .await?;
                info!(
                    kind = %kind,
                    day,
                    processed = summary.processed,
                    enqueued = summary.enqueued,
                    skipped = summary.skipped,
                    "daily check completed"
                );
                Ok(summary)
            },
            Err(e) => {
                if let Err(mark) = self
                    .executions
                    .fail(&execution_id, &e.to_string(), finished)
                    .await
                {
                    warn!(execution_id, error = %mark, "could not mark execution failed");
                }
                Err(e)
            },
        }
    }

    // ── Shared generator plumbing ───────────────────────────────────────────

    /// The automation's bot when it exists and is active; otherwise the
    /// problem is recorded on the summary.
    pub(crate) async fn automation_bot(
        &self,
        automation: &Automation,
        summary: &mut RunSummary,
    ) -> Result<Option<Bot>> {
        match self.business.get_bot(&automation.bot_id).await? {
            Some(bot) if bot.active => Ok(Some(bot)),
            Some(bot) => {
                summary
                    .errors
                    .push(format!("automation {}: bot {} is inactive", automation.id, bot.id));
                Ok(None)
            },
            None => {
                summary.errors.push(format!(
                    "automation {}: bot {} not found",
                    automation.id, automation.bot_id
                ));
                Ok(None)
            },
        }
    }

    pub(crate) async fn profile(&self, owner_id: &str) -> Result<BusinessProfile> {
        Ok(self
            .business
            .get_profile(owner_id)
            .await?
            .unwrap_or_else(|| BusinessProfile {
                owner_id: owner_id.to_string(),
                ..BusinessProfile::default()
            }))
    }

    /// Render a message for `client`, or count the client as skipped when
    /// they have no contact for the bot's platform.
    pub(crate) fn compose(
        automation: &Automation,
        bot: &Bot,
        client: &Client,
        vars: &TemplateVars,
        scheduled_for: i64,
        summary: &mut RunSummary,
    ) -> Option<NewScheduledMessage> {
        summary.processed += 1;
        let Some(recipient) = client.contact_for(bot.platform) else {
            summary.skipped += 1;
            return None;
        };
        Some(NewScheduledMessage {
            owner_id: automation.owner_id.clone(),
            automation_id: Some(automation.id.clone()),
            client_id: Some(client.id.clone()),
            bot_id: bot.id.clone(),
            platform: bot.platform,
            recipient: recipient.to_string(),
            content: render(&automation.message_template, vars),
            metadata: message_metadata(automation, bot.platform, vars),
            scheduled_for,
            priority: automation.config.priority.unwrap_or(DEFAULT_PRIORITY),
        })
    }

    /// Insert in batches, each followed by its `queued` audit rows, then tell
    /// every affected owner how many messages were scheduled.
    pub(crate) async fn enqueue(
        &self,
        messages: Vec<NewScheduledMessage>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let now = self.now();
        let mut per_owner: BTreeMap<String, u64> = BTreeMap::new();
        for batch in messages.chunks(self.settings.insert_batch_size.max(1)) {
            let ids = self.scheduled.insert_batch(batch, now).await?;
            let entries: Vec<AuditEntry> = batch
                .iter()
                .zip(ids)
                .map(|(msg, id)| AuditEntry {
                    owner_id: msg.owner_id.clone(),
                    automation_id: msg.automation_id.clone(),
                    scheduled_message_id: Some(id),
                    client_id: msg.client_id.clone(),
                    platform: msg.platform,
                    status: LogStatus::Queued,
                    recipient: Some(msg.recipient.clone()),
                    provider_message_id: None,
                    error: None,
                })
                .collect();
            self.audit.record_batch(&entries, now).await?;
            for msg in batch {
                *per_owner.entry(msg.owner_id.clone()).or_default() += 1;
            }
            summary.batches.push(batch.len());
            summary.enqueued += batch.len() as u64;
        }

        for (owner, count) in per_owner {
            self.notifier
                .notify(Notification::new(
                    owner,
                    NotificationKind::Success,
                    "Messages scheduled",
                    format!("{count} {} message(s) scheduled", summary.kind),
                ))
                .await;
        }
        Ok(())
    }
}


#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::{testing::*, *},
        courier_common::Platform,
        courier_store::models::{AutomationConfig, AutomationKind},
    };

    #[tokio::test]
    async fn targetless_event_triggers_are_rejected() {
        let h = harness().await;
        let err = h
            .service
            .run(TriggerKind::PromotionBroadcast, None)
            .await
            .unwrap_err();
        assert!(matches!(&err, Error::Message(m) if m == "promotion_id is required"));
        let err = h.service.run(TriggerKind::Welcome, None).await.unwrap_err();
        assert!(matches!(&err, Error::Message(m) if m == "client_id is required"));
    }

    #[tokio::test]
    async fn inactive_bot_is_reported_not_fatal() {
        let h = harness().await;
        add_bot(&h.stores, "b1", Platform::Whatsapp).await;
        add_automation(
            &h.stores,
            "a1",
            "b1",
            AutomationKind::InactiveClient,
            "Te extrañamos {first_name}",
            AutomationConfig::default(),
        )
        .await;
        h.stores
            .business
            .insert_client(&client("c1", "Ana", Some("5492611234567"), 0))
            .await
            .unwrap();
        sqlx::query("UPDATE bots SET active = 0 WHERE id = 'b1'")
            .execute(&h.stores.pool)
            .await
            .unwrap();

        let summary = h
            .service
            .run(TriggerKind::InactiveClientCheck, None)
            .await
            .unwrap();
        assert_eq!(summary.enqueued, 0);
        assert_eq!(summary.errors, vec!["automation a1: bot b1 is inactive"]);
    }

    #[tokio::test]
    async fn status_counts_today() {
        let h = harness().await;
        h.service.run_daily_checks().await;
        let status = h.service.status().await.unwrap();
        assert_eq!(status.day, "2026-03-10");
        assert_eq!(status.executions_today, 2);
        assert_eq!(status.pending_messages, 0);
    }

    #[test]
    fn settings_from_default_config() {
        let settings = TriggerSettings::from_config(&CourierConfig::default()).unwrap();
        assert_eq!(settings.birthday_jitter, Duration::from_secs(3600));
        assert_eq!(settings.inactive_jitter, Duration::from_secs(4 * 3600));
        assert_eq!(settings.insert_batch_size, 100);
        assert_eq!(settings.timezone, Tz::UTC);
    }
}
