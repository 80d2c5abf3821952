//! Calendar-day boundary detection for the daily journal export.

use chrono::{DateTime, Days, NaiveDate, TimeZone};

/// True when `now` falls on a different calendar date than `previous` in
/// `now`'s time zone. A missing `previous` (first run) is always a new day.
pub fn is_new_day<Tz: TimeZone>(previous: Option<&DateTime<Tz>>, now: &DateTime<Tz>) -> bool {
    match previous {
        None => true,
        Some(previous) => {
            previous.with_timezone(&now.timezone()).date_naive() != now.date_naive()
        }
    }
}

/// The calendar day before `now`'s date: the day whose journal is exported.
pub fn previous_day<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    let today = now.date_naive();
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local, Utc};

    fn at(offset_hours: i32, rfc3339: &str) -> DateTime<FixedOffset> {
        let tz = FixedOffset::east_opt(offset_hours * 3600).expect("offset");
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("timestamp")
            .with_timezone(&tz)
    }

    #[test]
    fn first_run_is_always_a_new_day() {
        assert!(is_new_day(None, &Local::now()));
        assert!(is_new_day::<Utc>(None, &Utc::now()));
    }

    #[test]
    fn same_date_minutes_apart_is_not_a_new_day() {
        let earlier = at(2, "2026-03-14T00:05:00+02:00");
        let later = at(2, "2026-03-14T23:55:00+02:00");
        assert!(!is_new_day(Some(&earlier), &later));
    }

    #[test]
    fn straddling_midnight_seconds_apart_is_a_new_day() {
        let before = at(-5, "2026-03-14T23:59:59-05:00");
        let after = at(-5, "2026-03-15T00:00:01-05:00");
        assert!(is_new_day(Some(&before), &after));
    }

    #[test]
    fn boundary_uses_the_local_zone_not_utc() {
        // 01:00 and 03:00 at +02:00 straddle UTC midnight but share a local date.
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        let earlier = DateTime::parse_from_rfc3339("2026-03-14T23:00:00Z")
            .expect("ts")
            .with_timezone(&tz);
        let later = DateTime::parse_from_rfc3339("2026-03-15T01:00:00Z")
            .expect("ts")
            .with_timezone(&tz);
        assert_eq!(earlier.date_naive(), later.date_naive());
        assert!(!is_new_day(Some(&earlier), &later));
    }

    #[test]
    fn previous_day_crosses_month_boundaries() {
        let now = at(0, "2026-03-01T08:00:00+00:00");
        assert_eq!(
            previous_day(&now),
            NaiveDate::from_ymd_opt(2026, 2, 28).expect("date")
        );
    }
}
