//! In-process scheduler: one timer loop per cron expression, each sleeping
//! until the next fire time and then running its job to completion.

use std::time::Duration;

use {
    chrono_tz::Tz,
    tokio::task::JoinHandle,
    tracing::{debug, error, info, warn},
};

use {
    courier_common::time::now_ms,
    courier_queue::ProcessRequest,
    courier_triggers::next_fire,
};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    Queue,
    DailyChecks,
}

impl Job {
    fn name(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::DailyChecks => "daily_checks",
        }
    }
}

/// Spawn the queue and daily-check loops. Expressions are validated before
/// anything is spawned.
pub fn spawn_scheduler(state: &AppState) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let schedule = &state.config.schedule;
    let tz = state.triggers.settings().timezone;
    let now = now_ms();

    let mut handles = Vec::with_capacity(2);
    for (job, expr) in [
        (Job::Queue, schedule.queue.clone()),
        (Job::DailyChecks, schedule.daily_checks.clone()),
    ] {
        let first = next_fire(&expr, now, tz)?;
        info!(job = job.name(), %expr, next_fire_ms = ?first, "scheduler loop started");
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            timer_loop(state, job, expr, tz).await;
        }));
    }
    Ok(handles)
}

async fn timer_loop(state: AppState, job: Job, expr: String, tz: Tz) {
    loop {
        let now = now_ms();
        let next = match next_fire(&expr, now, tz) {
            Ok(Some(next)) => next,
            Ok(None) => {
                info!(job = job.name(), "schedule has no further fire times");
                return;
            },
            Err(e) => {
                error!(job = job.name(), error = %e, "schedule evaluation failed");
                return;
            },
        };
        let wait = u64::try_from(next.saturating_sub(now)).unwrap_or(0);
        debug!(job = job.name(), wait_ms = wait, "scheduler sleeping");
        tokio::time::sleep(Duration::from_millis(wait)).await;
        run_job(&state, job).await;
    }
}

async fn run_job(state: &AppState, job: Job) {
    match job {
        Job::Queue => match state.queue.process(&ProcessRequest::default()).await {
            Ok(summary) => info!(
                processed = summary.processed,
                sent = summary.sent,
                failed = summary.failed,
                remaining = summary.remaining,
                "scheduled queue run finished"
            ),
            Err(e) => warn!(error = %e, "scheduled queue run failed"),
        },
        Job::DailyChecks => {
            for summary in state.triggers.run_daily_checks().await {
                info!(
                    kind = %summary.kind,
                    already_completed = summary.already_completed,
                    enqueued = summary.enqueued,
                    "scheduled daily check finished"
                );
            }
        },
    }
}
