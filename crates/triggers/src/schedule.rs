//! Cron evaluation for the built-in scheduler and send-time jitter.

use {
    chrono::{DateTime, Utc},
    chrono_tz::Tz,
    rand::Rng,
};

use {courier_common::time::to_datetime, courier_config::validate::parse_cron};

use crate::Result;

/// Next firing of a 5- or 6-field cron expression strictly after `after_ms`,
/// evaluated in `tz`. `None` when the schedule never fires again.
pub fn next_fire(expr: &str, after_ms: i64, tz: Tz) -> Result<Option<i64>> {
    let schedule = parse_cron(expr)?;
    let after: DateTime<Utc> = to_datetime(after_ms);
    Ok(schedule
        .after(&after.with_timezone(&tz))
        .next()
        .map(|dt| dt.timestamp_millis()))
}

/// `base_ms` shifted by a uniform random offset in `[0, window_ms)`.
#[must_use]
pub fn jittered(base_ms: i64, window_ms: i64) -> i64 {
    if window_ms <= 0 {
        return base_ms;
    }
    base_ms + rand::rng().random_range(0..window_ms)
}
