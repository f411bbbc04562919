//! Pure wall-clock operations: parsing `HH:MM` times, placing them on a
//! date in a timezone, recognizing banking days, and checking whether an
//! incoming check-in lies within a tolerance window of a scheduled time.
//!
//! Everything here is a pure function of its arguments — no I/O, no
//! reading of the system clock. Callers thread `now` in explicitly (see
//! [`crate::time_source::TimeSource`]).

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Weekday};
use chrono_tz::Tz;

use crate::error::{ParseTimeOfDayError, ToleranceError};

/// A wall-clock time of day, with minute resolution, as configured via an
/// `"HH:MM"` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    /// Parses a 24-hour `"HH:MM"` string.
    pub fn parse_hhmm(s: &str) -> Result<Self, ParseTimeOfDayError> {
        let (h, m) = s
            .split_once(':')
            .ok_or_else(|| ParseTimeOfDayError::Malformed(s.to_string()))?;
        let hour: u32 = h
            .parse()
            .map_err(|_| ParseTimeOfDayError::Malformed(s.to_string()))?;
        let minute: u32 = m
            .parse()
            .map_err(|_| ParseTimeOfDayError::Malformed(s.to_string()))?;
        TimeOfDay::new(hour, minute).ok_or_else(|| {
            if hour > 23 {
                ParseTimeOfDayError::HourOutOfRange(hour)
            } else {
                ParseTimeOfDayError::MinuteOutOfRange(minute)
            }
        })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl<Tzone: TimeZone> From<DateTime<Tzone>> for TimeOfDay {
    fn from(dt: DateTime<Tzone>) -> Self {
        TimeOfDay {
            hour: dt.hour(),
            minute: dt.minute(),
        }
    }
}

/// Places a [`TimeOfDay`] on a calendar date, in a timezone.
///
/// Returns `None` for a local wall-clock time that does not exist (spring
/// forward) or is ambiguous (fall back) in `tz` — callers treat that as a
/// configuration-adjacent failure rather than silently picking one offset.
pub fn at_date(date: NaiveDate, tod: TimeOfDay, tz: Tz) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(tod.hour, tod.minute, 0)?;
    tz.from_local_datetime(&naive).single()
}

/// True iff `date` is Monday-Friday and not a banking holiday.
pub fn is_banking_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_banking_holiday(date)
}

/// The smallest date strictly after `date` for which [`is_banking_day`] holds.
pub fn next_banking_day(date: NaiveDate) -> NaiveDate {
    let mut d = date.succ_opt().expect("NaiveDate overflow while scanning for next banking day");
    while !is_banking_day(d) {
        d = d.succ_opt().expect("NaiveDate overflow while scanning for next banking day");
    }
    d
}

fn is_banking_holiday(date: NaiveDate) -> bool {
    banking_holidays(date.year()).contains(&date)
}

/// U.S. federal/banking holiday observance table for `year`, shifted to the
/// nearest weekday when the nominal date falls on a weekend.
///
/// This is the one domain table `spec.md` §9 flags as an open question; see
/// `DESIGN.md` for why this specific set was chosen.
fn banking_holidays(year: i32) -> [NaiveDate; 11] {
    [
        observed(ymd(year, 1, 1)),           // New Year's Day
        nth_weekday(year, 1, Weekday::Mon, 3), // Martin Luther King Jr. Day
        nth_weekday(year, 2, Weekday::Mon, 3), // Washington's Birthday
        last_weekday(year, 5, Weekday::Mon),   // Memorial Day
        observed(ymd(year, 6, 19)),           // Juneteenth
        observed(ymd(year, 7, 4)),            // Independence Day
        nth_weekday(year, 9, Weekday::Mon, 1), // Labor Day
        nth_weekday(year, 10, Weekday::Mon, 2), // Columbus Day
        observed(ymd(year, 11, 11)),          // Veterans Day
        nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving
        observed(ymd(year, 12, 25)),          // Christmas Day
    ]
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("fixed holiday date must be valid")
}

/// Shifts a holiday landing on Saturday to the preceding Friday, and one
/// landing on Sunday to the following Monday (the standard federal
/// observance rule).
fn observed(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// The `n`th occurrence (1-indexed) of `weekday` in `month` of `year`.
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = ymd(year, month, 1);
    let offset = (7 + weekday.num_days_from_monday() as i64 - first.weekday().num_days_from_monday() as i64) % 7;
    first + Duration::days(offset + 7 * (n as i64 - 1))
}

/// The last occurrence of `weekday` in `month` of `year`.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let next_month_first = if month == 12 {
        ymd(year + 1, 1, 1)
    } else {
        ymd(year, month + 1, 1)
    };
    let mut d = next_month_first - Duration::days(1);
    while d.weekday() != weekday {
        d -= Duration::days(1);
    }
    d
}

/// Checks whether `now` lies within `tolerance` of `scheduled`.
///
/// A `tolerance` of zero disables the check entirely (returns `Ok`
/// unconditionally) rather than demanding an exact-instant match — this
/// mirrors the source, where a schedule without a configured tolerance
/// (e.g. `Every`) never had check-in validation applied to it. See
/// `DESIGN.md` for the reasoning.
pub fn within_tolerance(
    now: DateTime<Tz>,
    scheduled: DateTime<Tz>,
    tolerance: Duration,
) -> Result<(), ToleranceError> {
    if tolerance <= Duration::zero() {
        return Ok(());
    }

    let scheduled_hhmm = TimeOfDay::from(scheduled).to_string();

    match now.cmp(&scheduled) {
        Ordering::Less => {
            let diff = scheduled - now;
            if diff > tolerance {
                Err(ToleranceError::Early {
                    scheduled_hhmm,
                    magnitude: (diff - tolerance).into(),
                })
            } else {
                Ok(())
            }
        }
        Ordering::Equal => Ok(()),
        Ordering::Greater => {
            let diff = now - scheduled;
            if diff > tolerance {
                Err(ToleranceError::Late {
                    scheduled_hhmm,
                    magnitude: (diff - tolerance).into(),
                })
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;

    #[test]
    fn parses_hhmm() {
        assert_eq!(TimeOfDay::parse_hhmm("09:05").unwrap(), TimeOfDay::new(9, 5).unwrap());
        assert_eq!(TimeOfDay::parse_hhmm("23:59").unwrap(), TimeOfDay::new(23, 59).unwrap());
        assert!(TimeOfDay::parse_hhmm("24:00").is_err());
        assert!(TimeOfDay::parse_hhmm("09:60").is_err());
        assert!(TimeOfDay::parse_hhmm("garbage").is_err());
    }

    #[test]
    fn columbus_day_2024_is_not_a_banking_day() {
        let columbus_day = NaiveDate::from_ymd_opt(2024, 10, 14).unwrap();
        assert!(!is_banking_day(columbus_day));
    }

    #[test]
    fn friday_before_columbus_day_rolls_to_tuesday_after() {
        // Friday 2024-10-11 -> Sat/Sun excluded -> Mon 10-14 is Columbus Day -> Tue 10-15
        let friday = NaiveDate::from_ymd_opt(2024, 10, 11).unwrap();
        assert_eq!(next_banking_day(friday), NaiveDate::from_ymd_opt(2024, 10, 15).unwrap());
    }

    #[test]
    fn juneteenth_2022_observed_on_monday() {
        // 2022-06-19 was a Sunday; the observed holiday shifts to 2022-06-20.
        let sunday = NaiveDate::from_ymd_opt(2022, 6, 19).unwrap();
        assert_eq!(sunday.weekday(), Weekday::Sun);
        assert!(!is_banking_day(NaiveDate::from_ymd_opt(2022, 6, 20).unwrap()));
    }

    #[test]
    fn within_tolerance_exact_match() {
        let t = New_York.with_ymd_and_hms(2024, 10, 17, 14, 0, 0).unwrap();
        assert!(within_tolerance(t, t, Duration::minutes(5)).is_ok());
    }

    #[test]
    fn within_tolerance_early_violation_reports_magnitude() {
        let scheduled = New_York.with_ymd_and_hms(2024, 10, 17, 14, 0, 0).unwrap();
        let now = scheduled - Duration::hours(1);
        let err = within_tolerance(now, scheduled, Duration::minutes(1)).unwrap_err();
        assert!(err.to_string().contains("not allowed for 59m"));
    }

    #[test]
    fn within_tolerance_late_violation_reports_magnitude() {
        let scheduled = New_York.with_ymd_and_hms(2024, 10, 17, 14, 0, 0).unwrap();
        let now = scheduled + Duration::minutes(10);
        let err = within_tolerance(now, scheduled, Duration::minutes(5)).unwrap_err();
        assert!(err.to_string().contains("is late by"));
        assert!(err.to_string().contains("5m0s"));
    }

    #[test]
    fn zero_tolerance_disables_the_check() {
        let scheduled = New_York.with_ymd_and_hms(2024, 10, 17, 14, 0, 0).unwrap();
        let now = scheduled + Duration::hours(6);
        assert!(within_tolerance(now, scheduled, Duration::zero()).is_ok());
    }
}
