//! Retry budget accounting.

use {chrono_tz::Tz, courier_common::time::same_day};

/// Retry count to store after a failed attempt.
///
/// The first failure always counts. Later failures count only when the
/// previous update happened on another calendar day in `tz`, so the budget is
/// spent across distinct days rather than consecutive attempts. A failure at
/// 23:59 followed by one at 00:01 therefore counts twice.
#[must_use]
pub fn next_retry_count(current: u32, last_update_ms: i64, now_ms: i64, tz: Tz) -> u32 {
    if current == 0 || !same_day(last_update_ms, now_ms, tz) {
        current.saturating_add(1)
    } else {
        current
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    // 2026-03-10T12:00:00Z
    const NOON: i64 = 1_773_144_000_000;
    const HOUR: i64 = 3_600_000;
    const MINUTE: i64 = 60_000;

    #[rstest]
    #[case::first_failure(0, NOON, NOON, 1)]
    #[case::first_failure_even_same_instant(0, NOON - MINUTE, NOON, 1)]
    #[case::same_day_is_free(1, NOON - 3 * HOUR, NOON, 1)]
    #[case::next_day_counts(1, NOON - 24 * HOUR, NOON, 2)]
    #[case::two_minutes_across_midnight(2, NOON + 12 * HOUR - MINUTE, NOON + 12 * HOUR + MINUTE, 3)]
    #[case::exhausted_same_day(3, NOON, NOON + HOUR, 3)]
    fn utc_cases(
        #[case] current: u32,
        #[case] last_update: i64,
        #[case] now: i64,
        #[case] expected: u32,
    ) {
        assert_eq!(next_retry_count(current, last_update, now, Tz::UTC), expected);
    }

    #[test]
    fn day_boundary_follows_timezone() {
        // 02:30Z and 04:30Z are the same UTC day, but straddle midnight in
        // Buenos Aires (UTC-3): 23:30 and 01:30 local.
        let first = NOON - 9 * HOUR - 30 * MINUTE;
        let second = first + 2 * HOUR;
        assert_eq!(next_retry_count(1, first, second, Tz::UTC), 1);
        assert_eq!(
            next_retry_count(1, first, second, Tz::America__Argentina__Buenos_Aires),
            2
        );
    }
}
