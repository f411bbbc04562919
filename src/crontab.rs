//! Crontab string formatting for the health-check aggregator adapter,
//! grounded on `internal/crontab/crontab.go`.

use chrono::{DateTime, Datelike, Duration, Timelike};
use chrono_tz::Tz;

/// Formats an instant as a five-field crontab expression
/// (`minute hour day-of-month month day-of-week`).
pub fn format_time(when: DateTime<Tz>) -> String {
    format!(
        "{} {} {} {} {}",
        when.minute(),
        when.hour(),
        when.day(),
        when.month(),
        when.weekday().num_days_from_sunday(),
    )
}

/// Converts a duration into a crontab schedule expressing "every `dur`".
/// Not every duration has an exact crontab representation.
pub fn format_duration(dur: Duration, include_seconds: bool) -> String {
    let mut s = "0".to_string();
    let mut m = "0".to_string();
    let mut h = "*".to_string();
    let mut d = "*".to_string();

    let mut days = dur.num_days();
    if days >= 1 {
        days += 1;
        d = format!("1/{days}");
    }

    let hours = dur.num_hours() % 24;
    if hours >= 1 {
        if days >= 1 {
            h = format!("{hours}");
        } else {
            h = format!("1/{hours}");
        }
    }

    let mins = dur.num_minutes() % 60;
    if mins >= 1 {
        if hours > 1 {
            m = format!("{mins}");
        } else {
            m = format!("1/{mins}");
        }
    }

    let secs = dur.num_seconds() % 60;
    if secs >= 1 {
        s = format!("1/{secs}");
    }

    if include_seconds {
        format!("{s} {m} {h} {d} * *")
    } else {
        format!("{m} {h} {d} * *")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::UTC;

    #[test]
    fn formats_a_five_field_crontab_line() {
        let when = UTC.with_ymd_and_hms(2024, 10, 17, 9, 5, 0).unwrap();
        // 2024-10-17 is a Thursday (day-of-week 4).
        assert_eq!(format_time(when), "5 9 17 10 4");
    }

    #[test]
    fn formats_an_hourly_duration() {
        assert_eq!(format_duration(Duration::hours(1), false), "0 1/1 * * *");
    }

    #[test]
    fn formats_a_daily_duration() {
        assert_eq!(format_duration(Duration::days(1), false), "0 * 1/2 * *");
    }
}
