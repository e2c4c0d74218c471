use {
    chrono::{Datelike, Days, NaiveDate},
    tracing::debug,
};

use courier_common::time::{DAY_MS, local_date};

use crate::{
    Result,
    render::TemplateVars,
    schedule::jittered,
    service::{TriggerService, millis},
    types::RunSummary,
};

/// `MM-DD` keys that count as a birthday on `date`. In non-leap years
/// February 29 birthdays are celebrated on the 28th.
pub(crate) fn birthday_keys(date: NaiveDate) -> Vec<String> {
    let mut keys = vec![date.format("%m-%d").to_string()];
    if date.month() == 2
        && date.day() == 28
        && NaiveDate::from_ymd_opt(date.year(), 2, 29).is_none()
    {
        keys.push("02-29".into());
    }
    keys
}

impl TriggerService {
    pub(crate) async fn scan_birthdays(&self, now: i64, summary: &mut RunSummary) -> Result<()> {
        let tz = self.settings.timezone;
        let today = local_date(now, tz);
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
            let days_before = automation.config.days_before.unwrap_or(0);
            let Some(target) = today.checked_add_days(Days::new(u64::from(days_before))) else {
                continue;
            };
            let clients = self
                .business
                .clients_with_birthday(&automation.owner_id, &birthday_keys(target))
                .await?;
            debug!(
                automation_id = %automation.id,
                target = %target,
                matches = clients.len(),
                "birthday scan"
            );
            if clients.is_empty() {
                continue;
            }

            let profile = self.profile(&automation.owner_id).await?;
            for client in &clients {
                let vars = TemplateVars::for_client(client, &profile, &bot.name);
                let send_at = jittered(now, millis(self.settings.birthday_jitter).min(DAY_MS));
                if let Some(msg) =
                    Self::compose(&automation, &bot, client, &vars, send_at, summary)
                {
                    messages.push(msg);
                }
            }
        }
        self.enqueue(messages, summary).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{service::testing::*, types::TriggerKind},
        courier_common::{Platform, time::HOUR_MS},
        courier_store::models::{AutomationConfig, AutomationKind, LogStatus, MessageStatus},
        rstest::rstest,
    };

    #[rstest]
    #[case::plain("2026-03-10", &["03-10"])]
    #[case::non_leap_feb_28("2026-02-28", &["02-28", "02-29"])]
    #[case::leap_feb_28("2028-02-28", &["02-28"])]
    #[case::leap_feb_29("2028-02-29", &["02-29"])]
    fn keys(#[case] date: &str, #[case] expected: &[&str]) {
        let date: NaiveDate = date.parse().unwrap();
        assert_eq!(birthday_keys(date), expected);
    }

    async fn seeded() -> Harness {
        let h = harness().await;
        add_bot(&h.stores, "b1", Platform::Whatsapp).await;
        add_automation(
            &h.stores,
            "a1",
            "b1",
            AutomationKind::Birthday,
            "¡Feliz cumple {first_name}! Te saluda {business_name}",
            AutomationConfig::default(),
        )
        .await;
        let mut ana = client("c1", "Ana Gómez", Some("5492611234567"), 0);
        ana.birthday = Some("1990-03-10".into());
        let mut beto = client("c2", "Beto", None, 0);
        beto.birthday = Some("1985-03-10".into());
        let mut caro = client("c3", "Caro", Some("5492617654321"), 0);
        caro.birthday = Some("1992-07-01".into());
        for c in [ana, beto, caro] {
            h.stores.business.insert_client(&c).await.unwrap();
        }
        h
    }

    #[tokio::test]
    async fn enqueues_todays_birthdays_once_per_day() {
        let h = seeded().await;

        let first = h
            .service
            .run(TriggerKind::BirthdayCheck, None)
            .await
            .unwrap();
        assert!(!first.already_completed);
        assert_eq!(first.processed, 2);
        assert_eq!(first.enqueued, 1);
        assert_eq!(first.skipped, 1);

        let second = h
            .service
            .run(TriggerKind::BirthdayCheck, None)
            .await
            .unwrap();
        assert!(second.already_completed);
        assert_eq!(second.enqueued, 0);

        let queued = h.stores.scheduled.list_by_owner("o1").await.unwrap();
        assert_eq!(queued.len(), 1);
        let msg = &queued[0];
        assert_eq!(msg.content, "¡Feliz cumple Ana! Te saluda Panadería Sol");
        assert_eq!(msg.recipient, "5492611234567");
        assert_eq!(msg.status, MessageStatus::Pending);
        assert!((NOON..NOON + HOUR_MS).contains(&msg.scheduled_for));

        let audit = h.stores.audit.list_for_message(&msg.id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, LogStatus::Queued.as_str());

        let notes = h.notes.0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].owner_id, "o1");
    }

    #[tokio::test]
    async fn concurrent_runs_enqueue_once() {
        let h = seeded().await;
        let (a, b) = tokio::join!(
            h.service.run(TriggerKind::BirthdayCheck, None),
            h.service.run(TriggerKind::BirthdayCheck, None),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.enqueued + b.enqueued, 1);
        let (winner, loser) = if a.enqueued == 1 { (a, b) } else { (b, a) };
        assert!(!winner.already_completed && !winner.in_progress);
        assert!(loser.already_completed || loser.in_progress);

        let queued = h.stores.scheduled.list_by_owner("o1").await.unwrap();
        assert_eq!(queued.len(), 1);
    }

    #[tokio::test]
    async fn days_before_shifts_the_target_date() {
        let h = seeded().await;
        add_automation(
            &h.stores,
            "a2",
            "b1",
            AutomationKind::Birthday,
            "Se viene tu cumple, {first_name}",
            AutomationConfig {
                days_before: Some(3),
                ..AutomationConfig::default()
            },
        )
        .await;
        let mut dani = client("c4", "Dani", Some("5492610000000"), 0);
        dani.birthday = Some("2000-03-13".into());
        h.stores.business.insert_client(&dani).await.unwrap();

        let summary = h
            .service
            .run(TriggerKind::BirthdayCheck, None)
            .await
            .unwrap();
        assert_eq!(summary.automations, 2);
        assert_eq!(summary.enqueued, 2);
        let queued = h.stores.scheduled.list_by_owner("o1").await.unwrap();
        assert!(
            queued
                .iter()
                .any(|m| m.content == "Se viene tu cumple, Dani")
        );
    }

    #[tokio::test]
    async fn next_day_runs_again() {
        let h = seeded().await;
        h.service
            .run(TriggerKind::BirthdayCheck, None)
            .await
            .unwrap();
        h.set_now(NOON + 24 * HOUR_MS);
        let next = h
            .service
            .run(TriggerKind::BirthdayCheck, None)
            .await
            .unwrap();
        assert!(!next.already_completed);
        assert_eq!(next.enqueued, 0);
    }
}
