//! The check registry and lifecycle engine (`spec.md` §4.3): arms a
//! provider per check at startup, then serializes validate→compute→extend
//! on every check-in behind a per-switch lock.
//!
//! Grounded on `internal/check/checks.go`'s `Setup`/`CheckIn`, generalized
//! from PagerDuty-only to the tagged `AlertProvider` capability and from a
//! linear scan over `[]config.Check` to a `HashMap` plus a per-switch
//! `tokio::sync::Mutex` (§5: "multi-reader / single-writer per switch").

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::calendar::within_tolerance;
use crate::config::{Alert, Check, Config};
use crate::error::{CheckError, ProviderError};
use crate::provider::AlertProvider;
use crate::snooze;
use crate::time_source::TimeSource;

struct SwitchState {
    next_expected: DateTime<Utc>,
}

/// The runtime object for one configured check. Owns its provider handle
/// exclusively; the registry owns all switches.
struct Switch {
    check: Check,
    provider: Arc<AlertProvider>,
    state: Mutex<SwitchState>,
}

/// Read-only after [`Registry::setup`] (`spec.md` §5): no switch is added
/// or removed once startup completes, only mutated through its own lock.
pub struct Registry {
    switches: HashMap<String, Switch>,
    time_source: Arc<dyn TimeSource>,
}

impl Registry {
    /// Arms every configured check's provider in order. A single failure
    /// aborts the whole process — the caller is expected to propagate this
    /// as a fatal startup error.
    pub async fn setup(config: &Config, time_source: Arc<dyn TimeSource>) -> Result<Self, CheckError> {
        let mut switches = HashMap::with_capacity(config.checks.len());
        let mut provider_cache: Vec<(Alert, Arc<AlertProvider>)> = Vec::new();

        for check in &config.checks {
            let resolved_alert = config.resolved_alert(check);

            let provider = match provider_cache.iter().find(|(alert, _)| *alert == resolved_alert) {
                Some((_, cached)) => cached.clone(),
                None => {
                    let built = Arc::new(
                        AlertProvider::from_alert(&resolved_alert).map_err(CheckError::ProviderSetup)?,
                    );
                    provider_cache.push((resolved_alert, built.clone()));
                    built
                }
            };

            let now = time_source.now();
            let next_expected = provider.setup(check, now).await.map_err(CheckError::ProviderSetup)?;

            info!(check_id = %check.id, next_expected = %next_expected.to_rfc3339(), "check armed");

            switches.insert(
                check.id.clone(),
                Switch {
                    check: check.clone(),
                    provider,
                    state: Mutex::new(SwitchState { next_expected }),
                },
            );
        }

        Ok(Registry { switches, time_source })
    }

    /// Validates and processes an incoming check-in, extending the switch's
    /// deadline. Cancel-safe: if `cancel` fires mid-flight the in-progress
    /// provider call is abandoned and `CheckError::Canceled` is returned
    /// without touching local state.
    pub async fn check_in(&self, id: &str, cancel: &CancellationToken) -> Result<DateTime<Utc>, CheckError> {
        let switch = self.switches.get(id).ok_or_else(|| CheckError::NotFound(id.to_string()))?;

        tokio::select! {
            _ = cancel.cancelled() => Err(CheckError::Canceled),
            result = self.check_in_locked(switch) => result,
        }
    }

    async fn check_in_locked(&self, switch: &Switch) -> Result<DateTime<Utc>, CheckError> {
        let mut state = switch.state.lock().await;

        let now = self.time_source.now();
        let (scheduled, _) = snooze::calculate(now, &switch.check.schedule)?;

        let tolerance = switch.check.schedule.tolerance();
        let now_in_tz = now.with_timezone(&scheduled.timezone());
        within_tolerance(now_in_tz, scheduled, tolerance).map_err(|err| {
            if now_in_tz < scheduled {
                CheckError::Early(err)
            } else {
                CheckError::Late(err)
            }
        })?;

        // The second calculate() call measures the new deadline from the
        // idealized scheduled instant, not from the jittered arrival time.
        let scheduled_utc = scheduled.with_timezone(&Utc);
        let (_, wait) = snooze::calculate(scheduled_utc, &switch.check.schedule)?;
        let next_expected = scheduled_utc + wait;

        let applied = switch
            .provider
            .check_in(&switch.check, next_expected, now)
            .await
            .map_err(|err| match err {
                ProviderError::Http { .. } => CheckError::ProviderTransient(err),
                other => CheckError::ProviderSetup(other),
            })?;

        // Monotonic extension (`spec.md` §4.4): never let a provider's
        // answer shorten a deadline we already believe is pending.
        let next_expected = applied.max(state.next_expected);
        state.next_expected = next_expected;

        Ok(next_expected)
    }

    /// The currently armed deadline for `id`, if the check exists.
    pub async fn next_expected(&self, id: &str) -> Option<DateTime<Utc>> {
        let switch = self.switches.get(id)?;
        Some(switch.state.lock().await.next_expected)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.switches.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Schedule;
    use crate::config::ServerConfig;
    use crate::time_source::StaticClock;
    use chrono::{Duration, TimeZone};

    fn every_minute_config(id: &str) -> Config {
        Config {
            checks: vec![Check {
                id: id.to_string(),
                name: "nightly backup".to_string(),
                description: None,
                schedule: Schedule::Every { interval: Duration::minutes(1), start: None, end: None },
                alert: Alert { mock: Some(Default::default()), ..Default::default() },
            }],
            alert: Alert::default(),
            server: ServerConfig::default(),
        }
    }

    #[tokio::test]
    async fn unknown_check_id_is_not_found() {
        let config = every_minute_config("nightly-backup");
        let clock = Arc::new(StaticClock(Utc.with_ymd_and_hms(2024, 10, 7, 13, 0, 0).unwrap()));
        let registry = Registry::setup(&config, clock).await.unwrap();

        let cancel = CancellationToken::new();
        let err = registry.check_in("does-not-exist", &cancel).await.unwrap_err();
        assert!(matches!(err, CheckError::NotFound(_)));
    }

    #[tokio::test]
    async fn check_in_extends_the_deadline_past_setup() {
        let config = every_minute_config("nightly-backup");
        let clock = Arc::new(StaticClock(Utc.with_ymd_and_hms(2024, 10, 7, 13, 0, 0).unwrap()));
        let registry = Registry::setup(&config, clock.clone()).await.unwrap();

        let initial = registry.next_expected("nightly-backup").await.unwrap();

        let cancel = CancellationToken::new();
        let next = registry.check_in("nightly-backup", &cancel).await.unwrap();
        assert!(next >= initial);
    }

    #[tokio::test]
    async fn checks_sharing_an_alert_share_one_provider_instance() {
        let mut config = every_minute_config("a");
        config.checks.push(Check {
            id: "b".to_string(),
            name: "other job".to_string(),
            description: None,
            schedule: Schedule::Every { interval: Duration::minutes(1), start: None, end: None },
            alert: Alert { mock: Some(Default::default()), ..Default::default() },
        });
        let clock = Arc::new(StaticClock(Utc.with_ymd_and_hms(2024, 10, 7, 13, 0, 0).unwrap()));
        let registry = Registry::setup(&config, clock).await.unwrap();

        let a = &registry.switches["a"];
        let b = &registry.switches["b"];
        assert!(Arc::ptr_eq(&a.provider, &b.provider));
    }
}
