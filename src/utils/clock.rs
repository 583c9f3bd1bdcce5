// src/utils/clock.rs

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

/// All daily and monthly usage counters are keyed by the calendar of the
/// product's home region, a fixed UTC+08:00 offset with no DST. Server-local
/// time and plain UTC must never be used for counter keys.
pub const CANONICAL_OFFSET_HOURS: i64 = 8;

/// The canonical calendar day containing `now`.
pub fn canonical_date(now: DateTime<Utc>) -> NaiveDate {
    (now + Duration::hours(CANONICAL_OFFSET_HOURS)).date_naive()
}

/// Today in the canonical calendar.
pub fn today() -> NaiveDate {
    canonical_date(Utc::now())
}

/// The UTC instant at which the canonical current month began
/// (midnight UTC+08:00 on the first of the month).
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let date = canonical_date(now);
    let first = date - Duration::days(i64::from(date.day0()));
    let midnight = first.and_time(NaiveTime::MIN);
    DateTime::<Utc>::from_naive_utc_and_offset(
        midnight - Duration::hours(CANONICAL_OFFSET_HOURS),
        Utc,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    #[test]
    fn canonical_day_rolls_over_before_utc() {
        // 2026-03-01 20:30 UTC is already 2026-03-02 in UTC+08:00.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 20, 30, 0).unwrap();
        let date = canonical_date(now);
        assert_eq!((date.year(), date.month(), date.day()), (2026, 3, 2));
    }

    #[test]
    fn canonical_day_matches_utc_in_the_afternoon() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let date = canonical_date(now);
        assert_eq!((date.year(), date.month(), date.day()), (2026, 3, 1));
    }

    #[test]
    fn month_start_is_canonical_midnight() {
        // Late on Jan 31 UTC it is already February in the canonical zone,
        // so the month starts at Jan 31 16:00 UTC.
        let now = Utc.with_ymd_and_hms(2026, 1, 31, 20, 0, 0).unwrap();
        let start = month_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 1, 31, 16, 0, 0).unwrap());
    }

    #[test]
    fn month_start_mid_month() {
        let now = Utc.with_ymd_and_hms(2026, 5, 15, 12, 0, 0).unwrap();
        let start = month_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 4, 30, 16, 0, 0).unwrap());
    }
}
