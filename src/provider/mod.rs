//! The alert-provider capability: `Setup` arms a check's remote alert
//! object, `CheckIn` extends its deadline. Recast as a tagged enum rather
//! than a trait object (REDESIGN FLAGS, `spec.md` §9: "Provider
//! polymorphism") since the set of adapters is closed and known at compile
//! time, which keeps call sites free of `dyn`/`async-trait` machinery the
//! rest of this crate's stack doesn't otherwise need.

pub mod healthchecksio;
pub mod mock;
pub mod pagerduty;
pub mod slack;

use chrono::{DateTime, Utc};

use crate::config::{Alert, Check};
use crate::error::ProviderError;

/// One concrete provider client, resolved from a check's merged `Alert`.
///
/// Constructed once per distinct resolved `Alert` and cached by the
/// registry (REDESIGN FLAGS: "per-call provider client construction") —
/// `CheckIn` never rebuilds a client or re-resolves credentials.
pub enum AlertProvider {
    PagerDuty(pagerduty::Client),
    Slack(slack::Client),
    HealthChecksIo(healthchecksio::Client),
    Mock(mock::Client),
}

impl AlertProvider {
    /// Picks the first configured provider, in the same priority order
    /// `config::validate_providers` checks for presence: pagerduty, slack,
    /// healthchecksio, mock.
    pub fn from_alert(alert: &Alert) -> Result<Self, ProviderError> {
        if let Some(pd) = &alert.pagerduty {
            return Ok(AlertProvider::PagerDuty(pagerduty::Client::new(pd)?));
        }
        if let Some(slack_cfg) = &alert.slack {
            return Ok(AlertProvider::Slack(slack::Client::new(slack_cfg)?));
        }
        if let Some(hc) = &alert.healthchecksio {
            return Ok(AlertProvider::HealthChecksIo(healthchecksio::Client::new(hc)?));
        }
        Ok(AlertProvider::Mock(mock::Client::new()))
    }

    pub async fn setup(&self, check: &Check, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        match self {
            AlertProvider::PagerDuty(c) => c.setup(check, now).await,
            AlertProvider::Slack(c) => c.setup(check, now).await,
            AlertProvider::HealthChecksIo(c) => c.setup(check, now).await,
            AlertProvider::Mock(c) => c.setup(check, now).await,
        }
    }

    /// `now` is the registry's injected clock reading, threaded through so
    /// no adapter ever reaches for a process-wide `Utc::now()`
    /// (`time_source.rs`: the engine reads wall-clock time only through the
    /// `TimeSource` capability).
    pub async fn check_in(&self, check: &Check, next_expected: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        match self {
            AlertProvider::PagerDuty(c) => c.check_in(check, next_expected, now).await,
            AlertProvider::Slack(c) => c.check_in(check, next_expected, now).await,
            AlertProvider::HealthChecksIo(c) => c.check_in(check, next_expected, now).await,
            AlertProvider::Mock(c) => c.check_in(check, next_expected, now).await,
        }
    }
}
