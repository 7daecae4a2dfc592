//! Wall-clock arithmetic and display helpers for timer durations

use chrono::{DateTime, TimeZone, Timelike};

pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Largest hour value the countdown fields can show
pub const MAX_FIELD_HOURS: i64 = 99;

/// Second of the local day for `at`, evaluated in `at`'s own offset
pub fn second_of_day<Tz: TimeZone>(at: &DateTime<Tz>) -> i64 {
    i64::from(at.num_seconds_from_midnight())
}

/// Wrap any second count into `[0, SECONDS_PER_DAY)`
pub fn normalize_second_of_day(secs: i64) -> i64 {
    secs.rem_euclid(SECONDS_PER_DAY)
}

/// Membership of `second` in the half-open window `[start, stop)`.
///
/// A window with `stop < start` wraps past midnight.
pub fn in_window(second: i64, start: i64, stop: i64) -> bool {
    if stop < start {
        second >= start || second < stop
    } else {
        second >= start && second < stop
    }
}

/// Combine countdown fields into a second count; fields may overflow into each other
pub fn seconds_from_fields(hours: i64, minutes: i64, seconds: i64) -> i64 {
    hours
        .saturating_mul(3600)
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds)
}

/// Split a second count into `(hours, minutes, seconds)`, hours capped at 99
pub fn fields_from_seconds(secs: i64) -> (i64, i64, i64) {
    let secs = secs.max(0);
    let hours = (secs / 3600).min(MAX_FIELD_HOURS);
    (hours, (secs / 60) % 60, secs % 60)
}

/// Format a duration as `H:MM:SS`
pub fn format_hms(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Format a second-of-day as `HH:MM`
pub fn format_hhmm(second_of_day: i64) -> String {
    let secs = normalize_second_of_day(second_of_day);
    format!("{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn second_of_day_uses_the_instant_offset() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let at = plus_two.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        assert_eq!(second_of_day(&at), 82_800);
        assert_eq!(second_of_day(&at.with_timezone(&chrono::Utc)), 75_600);
    }

    #[test]
    fn plain_window_is_half_open() {
        assert!(in_window(0, 0, 28_800));
        assert!(in_window(28_799, 0, 28_800));
        assert!(!in_window(28_800, 0, 28_800));
    }

    #[test]
    fn wrapping_window_spans_midnight() {
        assert!(in_window(82_800, 79_200, 28_800));
        assert!(in_window(3_600, 79_200, 28_800));
        assert!(!in_window(43_200, 79_200, 28_800));
    }

    #[test]
    fn empty_window_never_matches() {
        assert!(!in_window(100, 100, 100));
    }

    #[test]
    fn fields_cap_hours() {
        assert_eq!(fields_from_seconds(5_400), (1, 30, 0));
        assert_eq!(fields_from_seconds(200 * 3600 + 61), (99, 1, 1));
        assert_eq!(seconds_from_fields(1, 30, 0), 5_400);
        assert_eq!(seconds_from_fields(0, 90, 75), 5_475);
        assert_eq!(seconds_from_fields(i64::MAX, 1, 1), i64::MAX);
    }

    #[test]
    fn formats() {
        assert_eq!(format_hms(5_400), "1:30:00");
        assert_eq!(format_hms(-4), "0:00:00");
        assert_eq!(format_hhmm(79_200), "22:00");
        assert_eq!(format_hhmm(-60), "23:59");
    }

    #[test]
    fn normalize_wraps_both_ways() {
        assert_eq!(normalize_second_of_day(86_400), 0);
        assert_eq!(normalize_second_of_day(-1), 86_399);
    }
}
