//! Go-style `time.Duration` formatting.
//!
//! The source this crate reimplements formats durations the way Go's
//! `time.Duration.String()` does (`"30m0s"`, `"22h37m55s"`): the largest
//! nonzero unit down to minutes is included only when nonzero, but seconds
//! are always printed. Error messages and logs use this format so they read
//! the same as the source's.

use std::fmt;

use chrono::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoDuration(pub Duration);

impl fmt::Display for GoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_seconds = self.0.num_seconds().max(0);
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        write!(f, "{seconds}s")
    }
}

impl From<Duration> for GoDuration {
    fn from(d: Duration) -> Self {
        GoDuration(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_go() {
        assert_eq!(GoDuration(Duration::minutes(30)).to_string(), "30m0s");
        assert_eq!(
            GoDuration(Duration::minutes(7) + Duration::seconds(55)).to_string(),
            "7m55s"
        );
        assert_eq!(
            GoDuration(Duration::hours(22) + Duration::minutes(37) + Duration::seconds(55)).to_string(),
            "22h37m55s"
        );
        assert_eq!(
            GoDuration(Duration::hours(95) + Duration::minutes(42) + Duration::seconds(55)).to_string(),
            "95h42m55s"
        );
        assert_eq!(GoDuration(Duration::zero()).to_string(), "0s");
    }
}
