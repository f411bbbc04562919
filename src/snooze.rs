//! The snooze calculator: given *now* and a schedule, computes the closest
//! scheduled check-in time and how long to suppress alerting for.
//!
//! Grounded on `internal/provider/snooze/snooze.go`. The "past every band
//! today" fallback returns today's first configured time as `scheduled`
//! even though the snooze duration is computed relative to a different
//! (future) occurrence — that asymmetry is preserved from the source
//! rather than "fixed", see `DESIGN.md`.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::calendar::{at_date, is_banking_day, next_banking_day, TimeOfDay};
use crate::config::Schedule;
use crate::error::SnoozeError;

/// Returns the closest scheduled check-in time and the duration to snooze
/// alerting for, given the current instant and a check's schedule.
pub fn calculate(now: DateTime<Utc>, schedule: &Schedule) -> Result<(DateTime<Tz>, Duration), SnoozeError> {
    match schedule {
        Schedule::Every { interval, start, end } => {
            calculate_every(now.with_timezone(&Tz::UTC), *interval, *start, *end)
        }
        Schedule::Weekdays { timezone, times, tolerance } => {
            calculate_partial_day(now, *timezone, times, *tolerance, false)
        }
        Schedule::BankingDays { timezone, times, tolerance } => {
            calculate_partial_day(now, *timezone, times, *tolerance, true)
        }
    }
}

fn calculate_every(
    now: DateTime<Tz>,
    interval: Duration,
    start: Option<TimeOfDay>,
    end: Option<TimeOfDay>,
) -> Result<(DateTime<Tz>, Duration), SnoozeError> {
    let Some(start_tod) = start else {
        return Ok((now, interval));
    };

    let tz = now.timezone();
    let today = now.date_naive();
    let mut start_dt = at_date(today, start_tod, tz).ok_or_else(|| ambiguous(start_tod, today))?;

    if let Some(end_tod) = end {
        let end_dt = at_date(today, end_tod, tz).ok_or_else(|| ambiguous(end_tod, today))?;
        if now > end_dt {
            start_dt += Duration::days(1);
        }
    }

    let now_tod = TimeOfDay::from(now);
    if now_tod > start_tod {
        loop {
            if now < start_dt {
                return Ok((start_dt, start_dt - now));
            }
            start_dt += interval;
        }
    }
    Ok((start_dt, start_dt - now))
}

fn calculate_partial_day(
    now_utc: DateTime<Utc>,
    tz: Tz,
    times: &[TimeOfDay],
    tolerance: Duration,
    banking: bool,
) -> Result<(DateTime<Tz>, Duration), SnoozeError> {
    if times.is_empty() {
        return Err(SnoozeError::NoTimesProvided);
    }

    let now = now_utc.with_timezone(&tz);
    let today = now.date_naive();

    for (idx, &hm) in times.iter().enumerate() {
        let scheduled = at_date(today, hm, tz).ok_or_else(|| ambiguous(hm, today))?;
        let low = scheduled - tolerance;
        let high = scheduled + tolerance;

        if low < now && now < high {
            let (next_date, next_hm) = match times.get(idx + 1) {
                Some(&hm2) => (today, hm2),
                None => (today.succ_opt().expect("date overflow while snoozing"), times[0]),
            };
            let next = at_date(next_date, next_hm, tz).ok_or_else(|| ambiguous(next_hm, next_date))?;
            let mut snooze = (next - now) + tolerance;
            if banking {
                snooze = snooze_until_next_banking_day(scheduled, snooze);
            }
            return Ok((scheduled, snooze));
        }

        if now < low {
            let mut snooze = high - now;
            if banking {
                snooze = snooze_until_next_banking_day(scheduled, snooze);
            }
            return Ok((scheduled, snooze));
        }
    }

    // Late to every band today; find tomorrow's (or the next banking day's) first time.
    let start_tod = times[0];
    let start = at_date(today, start_tod, tz).ok_or_else(|| ambiguous(start_tod, today))?;

    if banking {
        let next_day = next_banking_day(today);
        let future = at_date(next_day, start_tod, tz).ok_or_else(|| ambiguous(start_tod, next_day))?;
        Ok((start, (future - now) + tolerance))
    } else {
        let mut next_day = today.succ_opt().expect("date overflow while snoozing");
        if next_day.weekday() == Weekday::Sat {
            next_day = next_day.succ_opt().expect("date overflow while snoozing");
        }
        if next_day.weekday() == Weekday::Sun {
            next_day = next_day.succ_opt().expect("date overflow while snoozing");
        }
        let future = at_date(next_day, start_tod, tz).ok_or_else(|| ambiguous(start_tod, next_day))?;
        Ok((start, (future - now) + tolerance))
    }
}

/// If `scheduled + snooze` would land on a non-banking day, extends the
/// snooze so it lands on the next banking day instead, at the same time
/// of day.
fn snooze_until_next_banking_day(scheduled: DateTime<Tz>, snooze: Duration) -> Duration {
    let candidate = scheduled + snooze;
    if is_banking_day(candidate.date_naive()) {
        return snooze;
    }
    let next_day = next_banking_day(candidate.date_naive());
    let adjusted = replace_date(candidate, next_day);
    adjusted - scheduled
}

/// Rebuilds `dt` on a different calendar date, keeping its time-of-day.
fn replace_date(dt: DateTime<Tz>, date: NaiveDate) -> DateTime<Tz> {
    let tz = dt.timezone();
    let naive = NaiveDateTime::new(date, dt.time());
    tz.from_local_datetime(&naive)
        .single()
        .or_else(|| tz.from_local_datetime(&naive).earliest())
        .or_else(|| tz.from_local_datetime(&naive).latest())
        .expect("date/time combination must map to some instant")
}

fn ambiguous(tod: TimeOfDay, date: NaiveDate) -> SnoozeError {
    SnoozeError::AmbiguousLocalTime(format!("{tod} on {date}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use chrono_tz::UTC;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn every_unbounded_snoozes_for_the_interval() {
        let now = UTC.with_ymd_and_hms(2024, 10, 7, 13, 22, 5, ).unwrap();
        let (scheduled, snooze) = calculate_every(now, Duration::minutes(30), None, None).unwrap();
        assert_eq!(snooze.to_std().unwrap().as_secs(), 30 * 60);
        assert_eq!(scheduled, now);
    }

    #[test]
    fn every_bounded_after_end_advances_to_tomorrow() {
        let now = UTC.with_ymd_and_hms(2024, 10, 7, 13, 22, 5).unwrap();
        let start = TimeOfDay::new(12, 0).unwrap();
        let end = TimeOfDay::new(13, 0).unwrap();
        let (scheduled, snooze) = calculate_every(now, Duration::minutes(30), Some(start), Some(end)).unwrap();
        assert_eq!(crate::durfmt::GoDuration(snooze).to_string(), "22h37m55s");
        assert_eq!(scheduled.date_naive(), NaiveDate::from_ymd_opt(2024, 10, 8).unwrap());
    }

    #[test]
    fn every_bounded_inside_window_advances_by_interval() {
        let now = UTC.with_ymd_and_hms(2024, 10, 7, 13, 22, 5).unwrap();
        let start = TimeOfDay::new(13, 0).unwrap();
        let end = TimeOfDay::new(16, 0).unwrap();
        let (_, snooze) = calculate_every(now, Duration::minutes(30), Some(start), Some(end)).unwrap();
        assert_eq!(crate::durfmt::GoDuration(snooze).to_string(), "7m55s");
    }

    #[test]
    fn weekdays_before_first_band_snoozes_to_its_high_edge() {
        let now = utc(2024, 10, 7, 13, 22, 5);
        let times = vec![
            TimeOfDay::new(14, 0).unwrap(),
            TimeOfDay::new(15, 0).unwrap(),
            TimeOfDay::new(17, 0).unwrap(),
        ];
        let (scheduled, snooze) = calculate_partial_day(now, New_York, &times, Duration::minutes(5), false).unwrap();
        assert_eq!(crate::durfmt::GoDuration(snooze).to_string(), "4h42m55s");
        assert_eq!(TimeOfDay::from(scheduled).to_string(), "14:00");
    }

    #[test]
    fn weekdays_past_every_band_rolls_to_tomorrows_first_time() {
        let now = utc(2024, 10, 7, 13, 22, 5);
        let times = vec![
            TimeOfDay::new(9, 0).unwrap(),
            TimeOfDay::new(9, 10).unwrap(),
            TimeOfDay::new(9, 20).unwrap(),
        ];
        let (_, snooze) = calculate_partial_day(now, New_York, &times, Duration::minutes(5), false).unwrap();
        assert_eq!(crate::durfmt::GoDuration(snooze).to_string(), "23h42m55s");
    }

    #[test]
    fn banking_days_roll_over_weekend_and_holiday() {
        // Friday 2024-10-11 13:22:05 UTC; next banking day after the weekend
        // is Tue 2024-10-15 (Mon 2024-10-14 is Columbus Day).
        let now = utc(2024, 10, 11, 13, 22, 5);
        let times = vec![
            TimeOfDay::new(9, 0).unwrap(),
            TimeOfDay::new(9, 10).unwrap(),
            TimeOfDay::new(9, 20).unwrap(),
        ];
        let (scheduled, snooze) = calculate_partial_day(now, New_York, &times, Duration::minutes(5), true).unwrap();
        assert_eq!(crate::durfmt::GoDuration(snooze).to_string(), "95h42m55s");
        assert_eq!(TimeOfDay::from(scheduled).to_string(), "09:20");
        let next_expected = scheduled + snooze;
        assert_eq!(next_expected.date_naive(), NaiveDate::from_ymd_opt(2024, 10, 15).unwrap());
        assert_eq!(TimeOfDay::from(next_expected).to_string(), "09:05");
    }

    #[test]
    fn empty_times_is_rejected() {
        let now = utc(2024, 10, 7, 13, 22, 5);
        let err = calculate_partial_day(now, New_York, &[], Duration::minutes(5), false).unwrap_err();
        assert_eq!(err, SnoozeError::NoTimesProvided);
    }
}
