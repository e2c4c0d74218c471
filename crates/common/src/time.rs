//! Clock helpers. Timestamps are stored as epoch milliseconds; "calendar day"
//! is always evaluated in a configured IANA timezone.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    chrono::{DateTime, NaiveDate, TimeZone, Utc},
    chrono_tz::Tz,
};

use crate::{Error, Result};

pub const MINUTE_MS: i64 = 60_000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Injectable source of "now" in epoch millis.
pub type ClockFn = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Wall clock as a [`ClockFn`].
#[must_use]
pub fn system_clock() -> ClockFn {
    Arc::new(now_ms)
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| Error::UnknownTimezone(name.to_string()))
}

/// Convert epoch millis to a UTC datetime, clamping invalid values to the epoch.
#[must_use]
pub fn to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Calendar date of `ms` in `tz`.
#[must_use]
pub fn local_date(ms: i64, tz: Tz) -> NaiveDate {
    tz.from_utc_datetime(&to_datetime(ms).naive_utc()).date_naive()
}

/// `YYYY-MM-DD` key of the calendar day containing `ms` in `tz`.
#[must_use]
pub fn day_key(ms: i64, tz: Tz) -> String {
    local_date(ms, tz).format("%Y-%m-%d").to_string()
}

/// Whether two instants fall on the same calendar day in `tz`.
#[must_use]
pub fn same_day(a_ms: i64, b_ms: i64, tz: Tz) -> bool {
    local_date(a_ms, tz) == local_date(b_ms, tz)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn ms(s: &str) -> i64 {
        DateTime::parse_from_rfc3339(s).unwrap().timestamp_millis()
    }

    #[test]
    fn day_key_follows_timezone() {
        let t = ms("2026-03-01T02:30:00Z");
        assert_eq!(day_key(t, chrono_tz::UTC), "2026-03-01");
        // 02:30 UTC is still the previous evening in Buenos Aires (UTC-3).
        let ar = parse_timezone("America/Argentina/Buenos_Aires").unwrap();
        assert_eq!(day_key(t, ar), "2026-02-28");
    }

    #[test]
    fn same_day_across_midnight_is_false() {
        let before = ms("2026-05-10T23:59:00Z");
        let after = ms("2026-05-11T00:01:00Z");
        assert!(!same_day(before, after, chrono_tz::UTC));
        assert!(same_day(before, before - HOUR_MS, chrono_tz::UTC));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        assert!(parse_timezone("Mars/Olympus").is_err());
    }
}
