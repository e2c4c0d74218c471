//! Time-boxed drain loop over the scheduled message queue.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{Duration, Instant},
};

use {
    chrono_tz::Tz,
    futures::future::join_all,
    serde::{Deserialize, Serialize},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use courier_metrics::{counter, gauge, histogram, labels, queue as queue_metrics};

use {
    courier_channels::{OutboundMessage, SendOutcome, SenderRegistry},
    courier_common::{
        Notification, NotificationKind, NotificationSink,
        time::{ClockFn, parse_timezone, system_clock},
    },
    courier_config::CourierConfig,
    courier_store::{
        AuditLog, BusinessStore, ConversationKey, ConversationStore, Eligibility,
        ScheduledMessageStore, Stores,
        audit::USAGE_AUTOMATION_MESSAGE,
        models::{AuditEntry, Bot, LogStatus, NewMessage, ScheduledMessage, SenderType},
    },
};

use crate::{Result, retry::next_retry_count};

/// Tuning for one processor.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub batch_size: u32,
    pub concurrency: usize,
    pub deadline: Duration,
    pub max_retries: u32,
    pub stale_claim: Duration,
    /// Defines the calendar day used by the retry policy.
    pub timezone: Tz,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            concurrency: 10,
            deadline: Duration::from_secs(55),
            max_retries: 3,
            stale_claim: Duration::from_secs(600),
            timezone: Tz::UTC,
        }
    }
}

impl QueueSettings {
    pub fn from_config(config: &CourierConfig) -> Result<Self> {
        let queue = &config.queue;
        Ok(Self {
            batch_size: queue.batch_size.max(1),
            concurrency: queue.concurrency.max(1),
            deadline: Duration::from_secs(queue.deadline_secs),
            max_retries: queue.max_retries,
            stale_claim: Duration::from_secs(queue.stale_claim_secs),
            timezone: parse_timezone(&config.triggers.timezone)?,
        })
    }
}

/// Parameters of one invocation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessRequest {
    pub batch_size: Option<u32>,
    /// Restrict the invocation to one owner's messages.
    pub owner: Option<String>,
}

/// Result of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessSummary {
    /// Dispatch attempts made.
    pub processed: u64,
    /// Attempts that succeeded.
    pub sent: u64,
    /// Attempts that failed.
    pub failed: u64,
    /// Eligible rows left once the invocation stopped.
    pub remaining: u64,
    /// Fetch iterations performed.
    pub loops: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: u64,
    pub by_status: BTreeMap<String, u64>,
    pub timestamp: i64,
}

pub struct QueueProcessor {
    settings: QueueSettings,
    scheduled: ScheduledMessageStore,
    conversations: ConversationStore,
    business: BusinessStore,
    audit: AuditLog,
    senders: SenderRegistry,
    notifier: Arc<dyn NotificationSink>,
    clock: ClockFn,
}

impl QueueProcessor {
    pub fn new(
        stores: &Stores,
        senders: SenderRegistry,
        notifier: Arc<dyn NotificationSink>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            settings,
            scheduled: stores.scheduled.clone(),
            conversations: stores.conversations.clone(),
            business: stores.business.clone(),
            audit: stores.audit.clone(),
            senders,
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
    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    /// Drain due messages until the deadline passes or the queue runs dry.
    ///
    /// Per-message provider failures are recorded and never abort the run;
    /// store errors do.
    pub async fn process(&self, request: &ProcessRequest) -> Result<ProcessSummary> {
        let started = Instant::now();
        let invocation_start = self.now();
        let batch_size = request
            .batch_size
            .filter(|b| *b > 0)
            .unwrap_or(self.settings.batch_size);
        let owner = request.owner.as_deref();
        let max_retries = self.settings.max_retries;

        let stale_ms = i64::try_from(self.settings.stale_claim.as_millis()).unwrap_or(i64::MAX);
        let stale_before = invocation_start.saturating_sub(stale_ms);
        let released = self.scheduled.release_stale_claims(stale_before).await?;
        if released > 0 {
            warn!(released, "released stale queue claims");
            #[cfg(feature = "metrics")]
            counter!(queue_metrics::STALE_CLAIMS_RELEASED_TOTAL).increment(released);
        }

        let mut summary = ProcessSummary::default();
        let mut bots: HashMap<String, Option<Bot>> = HashMap::new();

        'outer: loop {
            if started.elapsed() >= self.settings.deadline {
                info!(loops = summary.loops, "queue deadline reached");
                break;
            }

            let filter = Eligibility::at(self.now(), max_retries)
                .owner(owner)
                .attempted_before(invocation_start);
            let due = self.scheduled.fetch_due(filter, batch_size).await?;
            summary.loops += 1;
            debug!(loop_index = summary.loops, fetched = due.len(), "fetched due messages");
            if due.is_empty() {
                break;
            }

            for chunk in due.chunks(self.settings.concurrency.max(1)) {
                if started.elapsed() >= self.settings.deadline {
                    info!(loops = summary.loops, "queue deadline reached between chunks");
                    break 'outer;
                }

                let ids: Vec<String> = chunk.iter().map(|m| m.id.clone()).collect();
                let claim_filter = Eligibility::at(self.now(), max_retries)
                    .owner(owner)
                    .attempted_before(invocation_start);
                let claimed = self.scheduled.claim(&ids, claim_filter).await?;
                if claimed.len() < ids.len() {
                    debug!(
                        requested = ids.len(),
                        claimed = claimed.len(),
                        "some rows were claimed elsewhere"
                    );
                }
                #[cfg(feature = "metrics")]
                counter!(queue_metrics::MESSAGES_CLAIMED_TOTAL).increment(claimed.len() as u64);

                for msg in &claimed {
                    if !bots.contains_key(&msg.bot_id) {
                        let bot = self.business.get_bot(&msg.bot_id).await?;
                        bots.insert(msg.bot_id.clone(), bot);
                    }
                }

                let outcomes = join_all(claimed.iter().map(|msg| {
                    let bot = bots.get(&msg.bot_id).and_then(Option::as_ref);
                    self.dispatch(msg, bot)
                }))
                .await;

                for (msg, outcome) in claimed.iter().zip(outcomes) {
                    summary.processed += 1;
                    if outcome.success {
                        summary.sent += 1;
                    } else {
                        summary.failed += 1;
                    }
                    self.settle(msg, outcome).await?;
                }
            }

            if due.len() < batch_size as usize {
                break;
            }
        }

        summary.remaining = self
            .scheduled
            .count_eligible(Eligibility::at(self.now(), max_retries).owner(owner))
            .await?;

        #[cfg(feature = "metrics")]
        {
            counter!(queue_metrics::INVOCATIONS_TOTAL).increment(1);
            histogram!(queue_metrics::INVOCATION_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
            gauge!(queue_metrics::REMAINING).set(summary.remaining as f64);
        }

        info!(
            processed = summary.processed,
            sent = summary.sent,
            failed = summary.failed,
            remaining = summary.remaining,
            loops = summary.loops,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "queue invocation finished"
        );
        Ok(summary)
    }

    async fn dispatch(&self, msg: &ScheduledMessage, bot: Option<&Bot>) -> SendOutcome {
        let Some(bot) = bot else {
            return SendOutcome::failed(format!("bot not found: {}", msg.bot_id));
        };
        self.senders.send(&OutboundMessage::from(msg), bot).await
    }

    /// Audit the attempt, then persist the resulting status.
    async fn settle(&self, msg: &ScheduledMessage, outcome: SendOutcome) -> Result<()> {
        let now = self.now();

        let mut entry = AuditEntry::for_message(
            msg,
            if outcome.success {
                LogStatus::Sent
            } else {
                LogStatus::Failed
            },
        );
        entry.provider_message_id = outcome.provider_message_id.clone();
        entry.error = outcome.error.clone();
        self.audit.record(&entry, now).await?;

        if outcome.success {
            self.scheduled
                .mark_sent(&msg.id, outcome.provider_message_id.as_deref(), now)
                .await?;
            self.record_in_conversation(msg, outcome.provider_message_id, now)
                .await?;
            self.audit
                .record_usage(
                    &msg.owner_id,
                    USAGE_AUTOMATION_MESSAGE,
                    msg.platform,
                    Some(&msg.id),
                    now,
                )
                .await?;
            #[cfg(feature = "metrics")]
            counter!(queue_metrics::MESSAGES_SENT_TOTAL, labels::PLATFORM => msg.platform.as_str())
                .increment(1);
            return Ok(());
        }

        let error = outcome.error.unwrap_or_else(|| "unknown error".into());
        let retry_count = next_retry_count(
            msg.retry_count,
            msg.updated_at,
            now,
            self.settings.timezone,
        );
        self.scheduled
            .mark_failed(&msg.id, retry_count, &error, now)
            .await?;
        #[cfg(feature = "metrics")]
        counter!(queue_metrics::MESSAGES_FAILED_TOTAL, labels::PLATFORM => msg.platform.as_str())
            .increment(1);

        let exhausted = retry_count >= self.settings.max_retries;
        warn!(
            message_id = %msg.id,
            owner_id = %msg.owner_id,
            platform = %msg.platform,
            retry_count,
            exhausted,
            error = %error,
            "scheduled message failed"
        );

        #[cfg(feature = "metrics")]
        {
            if exhausted && retry_count > msg.retry_count {
                counter!(
                    queue_metrics::MESSAGES_EXHAUSTED_TOTAL,
                    labels::PLATFORM => msg.platform.as_str()
                )
                .increment(1);
            }
        }
        let title = if exhausted {
            "Message could not be delivered"
        } else {
            "Message delivery failed"
        };
        self.notifier
            .notify(Notification::new(
                &msg.owner_id,
                NotificationKind::Error,
                title,
                format!(
                    "{} message to {} failed (attempt day {retry_count} of {}): {error}",
                    msg.platform, msg.recipient, self.settings.max_retries
                ),
            ))
            .await;
        Ok(())
    }

    /// Append a sent message to the recipient's conversation so replies see
    /// automation-originated context.
    async fn record_in_conversation(
        &self,
        msg: &ScheduledMessage,
        provider_message_id: Option<String>,
        now: i64,
    ) -> Result<()> {
        let key = ConversationKey {
            owner_id: &msg.owner_id,
            bot_id: &msg.bot_id,
            platform: msg.platform,
            counterparty_id: &msg.recipient,
        };
        let resolved = self.conversations.resolve(&key, &msg.recipient, now).await?;
        self.conversations
            .append_message(
                &resolved.conversation.id,
                &NewMessage {
                    sender_type: SenderType::Bot,
                    content: msg.content.clone(),
                    provider_message_id,
                    metadata: serde_json::json!({
                        "source": "automation",
                        "scheduled_message_id": msg.id,
                        "automation_id": msg.automation_id,
                    }),
                },
                now,
            )
            .await?;
        Ok(())
    }

    /// Row counts per status.
    pub async fn stats(&self) -> Result<QueueStats> {
        let by_status = self.scheduled.count_by_status().await?;
        Ok(QueueStats {
            total: by_status.values().sum(),
            by_status,
            timestamp: self.now(),
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
    };

    use {
        async_trait::async_trait,
        courier_channels::{PlatformSender, Receipt},
        courier_common::Platform,
        courier_store::{
            connect_in_memory,
            models::{MessageStatus, NewScheduledMessage},
        },
    };

    use super::*;

    // 2026-03-10T12:00:00Z
    const NOON: i64 = 1_773_144_000_000;
    const HOUR: i64 = 3_600_000;
    const MINUTE: i64 = 60_000;

    struct FakeSender {
        fail: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSender {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail: AtomicBool::new(fail),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PlatformSender for FakeSender {
        fn platform(&self) -> Platform {
            Platform::Whatsapp
        }

        async fn deliver(
            &self,
            message: &OutboundMessage,
            _bot: &Bot,
        ) -> courier_channels::Result<Receipt> {
            tokio::task::yield_now().await;
            self.calls
                .lock()
                .unwrap()
                .push(message.id.clone().unwrap_or_default());
            if self.fail.load(Ordering::SeqCst) {
                Err(courier_channels::Error::provider(429, "rate limited"))
            } else {
                Ok(Receipt::with_id(format!("wamid.{}", message.recipient)))
            }
        }
    }

    #[derive(Default)]
    struct CountingSink(AtomicUsize, Mutex<Vec<Notification>>);

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn notify(&self, notification: Notification) {
            self.0.fetch_add(1, Ordering::SeqCst);
            self.1.lock().unwrap().push(notification);
        }
    }

    struct Harness {
        stores: Stores,
        sender: Arc<FakeSender>,
        sink: Arc<CountingSink>,
        clock: Arc<AtomicI64>,
    }

    impl Harness {
        async fn new(fail: bool) -> Self {
            let stores = Stores::new(connect_in_memory().await.unwrap());
            stores
                .business
                .insert_bot(&Bot {
                    id: "bot-1".into(),
                    owner_id: "o1".into(),
                    name: "Sol".into(),
                    platform: Platform::Whatsapp,
                    platform_identifier: Some("111".into()),
                    active: true,
                    auto_reply: true,
                    created_at: 0,
                })
                .await
                .unwrap();
            Self {
                stores,
                sender: FakeSender::new(fail),
                sink: Arc::new(CountingSink::default()),
                clock: Arc::new(AtomicI64::new(NOON)),
            }
        }

        fn processor(&self, settings: QueueSettings) -> QueueProcessor {
            let clock = Arc::clone(&self.clock);
            QueueProcessor::new(
                &self.stores,
                SenderRegistry::new().with(self.sender.clone()),
                self.sink.clone(),
                settings,
            )
            .with_clock(Arc::new(move || clock.load(Ordering::SeqCst)))
        }

        fn set_now(&self, now: i64) {
            self.clock.store(now, Ordering::SeqCst);
        }

        async fn enqueue(&self, count: usize, owner: &str, scheduled_for: i64) -> Vec<String> {
            let msgs: Vec<_> = (0..count)
                .map(|i| NewScheduledMessage {
                    owner_id: owner.into(),
                    automation_id: None,
                    client_id: None,
                    bot_id: "bot-1".into(),
                    platform: Platform::Whatsapp,
                    recipient: format!("54926100{i:05}"),
                    content: format!("Hola {i}"),
                    metadata: serde_json::Value::Null,
                    scheduled_for,
                    priority: 5,
                })
                .collect();
            self.stores
                .scheduled
                .insert_batch(&msgs, scheduled_for)
                .await
                .unwrap()
        }

        async fn get(&self, id: &str) -> ScheduledMessage {
            self.stores.scheduled.get(id).await.unwrap().unwrap()
        }
    }

    fn request() -> ProcessRequest {
        ProcessRequest::default()
    }

    #[tokio::test]
    async fn drains_250_messages_in_three_fetches() {
        let h = Harness::new(false).await;
        h.enqueue(250, "o1", NOON - MINUTE).await;

        let summary = h
            .processor(QueueSettings::default())
            .process(&ProcessRequest {
                batch_size: Some(100),
                owner: None,
            })
            .await
            .unwrap();

        assert_eq!(summary.processed, 250);
        assert_eq!(summary.sent, 250);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.remaining, 0);
        assert!(summary.loops >= 3, "{summary:?}");
        assert_eq!(h.sender.call_count(), 250);

        let stats = h.processor(QueueSettings::default()).stats().await.unwrap();
        assert_eq!(stats.total, 250);
        assert_eq!(stats.by_status["sent"], 250);
        assert_eq!(stats.by_status["pending"], 0);
    }

    #[tokio::test]
    async fn success_is_audited_and_appended_to_conversation() {
        let h = Harness::new(false).await;
        let ids = h.enqueue(1, "o1", NOON).await;

        h.processor(QueueSettings::default())
            .process(&request())
            .await
            .unwrap();

        let sent = h.get(&ids[0]).await;
        assert_eq!(sent.status, MessageStatus::Sent);
        assert_eq!(sent.provider_message_id.as_deref(), Some("wamid.5492610000000"));
        assert_eq!(sent.sent_at, Some(NOON));

        let audit = h.stores.audit.list_for_message(&ids[0]).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].status, "sent");

        // The conversation is found through the national-number variant.
        let key = ConversationKey {
            owner_id: "o1",
            bot_id: "bot-1",
            platform: Platform::Whatsapp,
            counterparty_id: "2610000000",
        };
        let conversation = h.stores.conversations.find(&key).await.unwrap().unwrap();
        let history = h
            .stores
            .conversations
            .recent_messages(&conversation.id, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender_type, SenderType::Bot);
        assert_eq!(history[0].content, "Hola 0");

        assert_eq!(
            h.stores
                .audit
                .count_usage("o1", USAGE_AUTOMATION_MESSAGE)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn failure_is_attempted_once_per_invocation() {
        let h = Harness::new(true).await;
        let ids = h.enqueue(3, "o1", NOON - HOUR).await;

        let summary = h
            .processor(QueueSettings::default())
            .process(&request())
            .await
            .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.failed, 3);
        assert_eq!(h.sender.call_count(), 3);
        // Still eligible for a later invocation.
        assert_eq!(summary.remaining, 3);

        let failed = h.get(&ids[0]).await;
        assert_eq!(failed.status, MessageStatus::Failed);
        assert_eq!(failed.retry_count, 1);
        assert!(failed.last_error.unwrap().contains("429"));
        let audit = h.stores.audit.list_for_message(&ids[0]).await.unwrap();
        assert_eq!(audit[0].status, "failed");
        assert_eq!(h.sink.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn same_day_failures_count_once() {
        let h = Harness::new(true).await;
        let ids = h.enqueue(1, "o1", NOON - HOUR).await;
        let processor = h.processor(QueueSettings::default());

        for minutes in [0, 5, 90, 300] {
            h.set_now(NOON + minutes * MINUTE);
            processor.process(&request()).await.unwrap();
        }

        let msg = h.get(&ids[0]).await;
        assert_eq!(msg.retry_count, 1);
        assert_eq!(h.sender.call_count(), 4);
        // Every failed attempt is reported, counted or not.
        assert_eq!(h.sink.0.load(Ordering::SeqCst), 4);
        let notifications = h.sink.1.lock().unwrap();
        assert!(notifications.iter().all(|n| n.owner_id == "o1"
            && n.message.contains(&msg.recipient)
            && n.message.contains("429")));
    }

    #[tokio::test]
    async fn three_failing_days_make_the_message_terminal() {
        let h = Harness::new(true).await;
        let ids = h.enqueue(1, "o1", NOON - HOUR).await;
        let processor = h.processor(QueueSettings::default());

        for day in 0..3 {
            h.set_now(NOON + day * 24 * HOUR);
            processor.process(&request()).await.unwrap();
        }
        let msg = h.get(&ids[0]).await;
        assert_eq!(msg.retry_count, 3);
        assert_eq!(msg.status, MessageStatus::Failed);

        // A fourth day no longer picks it up.
        h.set_now(NOON + 3 * 24 * HOUR);
        let summary = processor.process(&request()).await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.remaining, 0);
        assert_eq!(h.sender.call_count(), 3);
    }

    #[tokio::test]
    async fn failures_two_minutes_apart_across_midnight_both_count() {
        let h = Harness::new(true).await;
        let ids = h.enqueue(1, "o1", NOON - HOUR).await;
        let processor = h.processor(QueueSettings::default());
        let midnight = NOON + 12 * HOUR;

        h.set_now(NOON);
        processor.process(&request()).await.unwrap();
        assert_eq!(h.get(&ids[0]).await.retry_count, 1);

        h.set_now(midnight - MINUTE);
        processor.process(&request()).await.unwrap();
        assert_eq!(h.get(&ids[0]).await.retry_count, 1);

        h.set_now(midnight + MINUTE);
        processor.process(&request()).await.unwrap();
        assert_eq!(h.get(&ids[0]).await.retry_count, 2);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let h = Harness::new(true).await;
        let ids = h.enqueue(1, "o1", NOON - HOUR).await;
        let processor = h.processor(QueueSettings::default());

        processor.process(&request()).await.unwrap();
        h.sender.fail.store(false, Ordering::SeqCst);
        h.set_now(NOON + MINUTE);
        let summary = processor.process(&request()).await.unwrap();

        assert_eq!(summary.sent, 1);
        let msg = h.get(&ids[0]).await;
        assert_eq!(msg.status, MessageStatus::Sent);
        assert_eq!(msg.retry_count, 1);
        assert_eq!(msg.last_error, None);
        assert_eq!(
            h.stores.audit.list_for_message(&ids[0]).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn owner_filter_and_future_rows_are_respected() {
        let h = Harness::new(false).await;
        h.enqueue(2, "o1", NOON - MINUTE).await;
        h.enqueue(2, "o2", NOON - MINUTE).await;
        h.enqueue(1, "o1", NOON + HOUR).await;

        let summary = h
            .processor(QueueSettings::default())
            .process(&ProcessRequest {
                batch_size: None,
                owner: Some("o1".into()),
            })
            .await
            .unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.remaining, 0);

        let all = h
            .processor(QueueSettings::default())
            .process(&request())
            .await
            .unwrap();
        assert_eq!(all.processed, 2);
    }

    #[tokio::test]
    async fn concurrent_invocations_dispatch_each_message_once() {
        let h = Harness::new(false).await;
        h.enqueue(40, "o1", NOON - MINUTE).await;
        let settings = QueueSettings {
            concurrency: 5,
            ..QueueSettings::default()
        };
        let a = h.processor(settings.clone());
        let b = h.processor(settings);

        let (req_a, req_b) = (request(), request());
        let (ra, rb) = tokio::join!(a.process(&req_a), b.process(&req_b));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        assert_eq!(ra.sent + rb.sent, 40);
        assert_eq!(h.sender.call_count(), 40);
        let mut seen = h.sender.calls.lock().unwrap().clone();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 40);
    }

    #[tokio::test]
    async fn stale_claims_are_released_at_start() {
        let h = Harness::new(false).await;
        let ids = h.enqueue(1, "o1", NOON - HOUR).await;
        let filter = Eligibility::at(NOON - 20 * MINUTE, 3);
        let claimed = h.stores.scheduled.claim(&ids, filter).await.unwrap();
        assert_eq!(claimed.len(), 1);

        let summary = h
            .processor(QueueSettings::default())
            .process(&request())
            .await
            .unwrap();
        assert_eq!(summary.sent, 1);
        assert_eq!(h.get(&ids[0]).await.status, MessageStatus::Sent);
    }

    #[tokio::test]
    async fn zero_deadline_does_nothing() {
        let h = Harness::new(false).await;
        h.enqueue(5, "o1", NOON - MINUTE).await;
        let summary = h
            .processor(QueueSettings {
                deadline: Duration::ZERO,
                ..QueueSettings::default()
            })
            .process(&request())
            .await
            .unwrap();
        assert_eq!(summary.loops, 0);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.remaining, 5);
    }

    #[tokio::test]
    async fn unknown_bot_fails_without_dispatch() {
        let h = Harness::new(false).await;
        let msg = NewScheduledMessage {
            owner_id: "o1".into(),
            automation_id: None,
            client_id: None,
            bot_id: "ghost".into(),
            platform: Platform::Whatsapp,
            recipient: "5492611234567".into(),
            content: "Hola".into(),
            metadata: serde_json::Value::Null,
            scheduled_for: NOON,
            priority: 5,
        };
        let id = h.stores.scheduled.insert(&msg, NOON).await.unwrap();
        h.processor(QueueSettings::default())
            .process(&request())
            .await
            .unwrap();
        let row = h.get(&id).await;
        assert_eq!(row.status, MessageStatus::Failed);
        assert_eq!(row.last_error.as_deref(), Some("bot not found: ghost"));
        assert_eq!(h.sender.call_count(), 0);
    }
}
