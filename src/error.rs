use thiserror::Error;

use crate::durfmt::GoDuration;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseTimeOfDayError {
    #[error("expected HH:MM, got {0:?}")]
    Malformed(String),
    #[error("hour {0} out of range 0-23")]
    HourOutOfRange(u32),
    #[error("minute {0} out of range 0-59")]
    MinuteOutOfRange(u32),
}

/// Returned by [`crate::calendar::within_tolerance`] when an incoming
/// check-in falls outside the tolerance band of its scheduled time.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToleranceError {
    #[error("{scheduled_hhmm} check-in not allowed for {magnitude}")]
    Early { scheduled_hhmm: String, magnitude: GoDuration },
    #[error("{scheduled_hhmm} check-in is late by {magnitude}")]
    Late { scheduled_hhmm: String, magnitude: GoDuration },
}

/// Errors raised while computing a snooze for a schedule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnoozeError {
    #[error("no times provided for schedule")]
    NoTimesProvided,
    #[error("local time {0} is ambiguous or does not exist in the schedule's timezone")]
    AmbiguousLocalTime(String),
}

/// Errors raised while loading and validating the YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing YAML config: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("check {id:?}: schedule must set exactly one of every/weekdays/bankingDays")]
    AmbiguousSchedule { id: String },
    #[error("check {id:?}: schedule has no every/weekdays/bankingDays set")]
    NoSchedule { id: String },
    #[error("check {id:?}: parsing {field} {value:?} as HH:MM: {source}")]
    BadTimeOfDay {
        id: String,
        field: &'static str,
        value: String,
        #[source]
        source: ParseTimeOfDayError,
    },
    #[error("check {id:?}: parsing {field} {value:?} as a duration: {source}")]
    BadDuration {
        id: String,
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("check {id:?}: loading timezone {tz:?}: {source}")]
    BadTimezone {
        id: String,
        tz: String,
        #[source]
        source: chrono_tz::ParseError,
    },
    #[error("check {id:?}: every.start ({start}) must be before every.end ({end})")]
    StartNotBeforeEnd { id: String, start: String, end: String },
    #[error("check {id:?}: no alert provider configured (locally or globally)")]
    NoProvider { id: String },
    #[error("duplicate check id {0:?}")]
    DuplicateId(String),
}

/// Errors raised by an [`crate::provider::AlertProvider`] adapter.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: http request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider}: API returned {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("{provider}: expected remote object not found")]
    NotFound { provider: &'static str },
    #[error("{provider}: operation canceled")]
    Canceled { provider: &'static str },
}

/// Errors raised by the check registry's lifecycle operations.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("check {0:?} not found")]
    NotFound(String),
    #[error("early check-in: {0}")]
    Early(ToleranceError),
    #[error("late check-in: {0}")]
    Late(ToleranceError),
    #[error("provider setup failed: {0}")]
    ProviderSetup(ProviderError),
    #[error("provider error during check-in: {0}")]
    ProviderTransient(ProviderError),
    #[error("check-in canceled")]
    Canceled,
    #[error("computing schedule: {0}")]
    Snooze(#[from] SnoozeError),
}

impl CheckError {
    /// HTTP status code the `server` module should translate this into.
    pub fn status_code(&self) -> u16 {
        match self {
            CheckError::NotFound(_) => 404,
            CheckError::Early(_) | CheckError::Late(_) => 409,
            CheckError::ProviderTransient(_) => 502,
            CheckError::ProviderSetup(_) | CheckError::Snooze(_) => 500,
            CheckError::Canceled => 499,
        }
    }
}
