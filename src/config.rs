//! Loads and validates the YAML configuration file, then merges in
//! environment-variable overrides (`spec.md` §6).
//!
//! This module keeps both the raw, serde-deserialized shape of the YAML
//! (`Raw*` types, which mirror the file 1:1) and the validated domain types
//! (`Config`, `Check`, `Schedule`, `Alert`, ...) that the rest of the crate
//! works with, the same separation `original_source/internal/config`
//! draws between the on-disk shape and the types `internal/check` and the
//! provider adapters consume.

use std::collections::HashSet;
use std::path::Path;

use chrono::Duration;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::calendar::TimeOfDay;
use crate::error::ConfigError;

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

/// Parses and validates a YAML document, then applies environment-variable
/// overrides. Split out from [`load`] so tests can exercise it without
/// touching the filesystem.
pub fn parse(yaml: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_yml::from_str(yaml)?;
    let mut config = Config::try_from(raw)?;
    apply_env_overrides(&mut config.alert);
    validate_providers(&config)?;
    Ok(config)
}

fn validate_providers(config: &Config) -> Result<(), ConfigError> {
    for check in &config.checks {
        let resolved = Alert::merge(&check.alert, &config.alert);
        if resolved.pagerduty.is_none()
            && resolved.slack.is_none()
            && resolved.healthchecksio.is_none()
            && resolved.mock.is_none()
        {
            return Err(ConfigError::NoProvider { id: check.id.clone() });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub checks: Vec<Check>,
    pub alert: Alert,
    pub server: ServerConfig,
}

impl Config {
    /// The resolved (local-wins-else-global) alert configuration for `check`.
    pub fn resolved_alert(&self, check: &Check) -> Alert {
        Alert::merge(&check.alert, &self.alert)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Check {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub schedule: Schedule,
    pub alert: Alert,
}

/// Exactly one of `Every`, `Weekdays`, `BankingDays` — enforced at parse
/// time by [`RawSchedule::into_schedule`].
#[derive(Debug, Clone)]
pub enum Schedule {
    Every {
        interval: Duration,
        start: Option<TimeOfDay>,
        end: Option<TimeOfDay>,
    },
    Weekdays {
        timezone: Tz,
        times: Vec<TimeOfDay>,
        tolerance: Duration,
    },
    BankingDays {
        timezone: Tz,
        times: Vec<TimeOfDay>,
        tolerance: Duration,
    },
}

impl Schedule {
    /// Zero for `Every` (it has no configured tolerance field), the
    /// configured value for `Weekdays`/`BankingDays`.
    pub fn tolerance(&self) -> Duration {
        match self {
            Schedule::Every { .. } => Duration::zero(),
            Schedule::Weekdays { tolerance, .. } | Schedule::BankingDays { tolerance, .. } => *tolerance,
        }
    }

    pub fn is_banking(&self) -> bool {
        matches!(self, Schedule::BankingDays { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alert {
    pub pagerduty: Option<PagerDutyConfig>,
    pub slack: Option<SlackConfig>,
    pub healthchecksio: Option<HealthChecksIoConfig>,
    pub mock: Option<MockConfig>,
}

impl Alert {
    /// `local` wins field-by-field over `global`; see `checks.go`'s
    /// `mergeAlertConfigs` in the original source.
    pub fn merge(local: &Alert, global: &Alert) -> Alert {
        Alert {
            pagerduty: PagerDutyConfig::merge(local.pagerduty.as_ref(), global.pagerduty.as_ref()),
            slack: SlackConfig::merge(local.slack.as_ref(), global.slack.as_ref()),
            healthchecksio: HealthChecksIoConfig::merge(local.healthchecksio.as_ref(), global.healthchecksio.as_ref()),
            mock: local.mock.clone().or_else(|| global.mock.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockConfig {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagerDutyConfig {
    pub api_key: Option<String>,
    pub escalation_policy: Option<String>,
    pub from: Option<String>,
    pub routing_key: Option<String>,
    pub urgency: Option<String>,
}

impl PagerDutyConfig {
    fn merge(local: Option<&Self>, global: Option<&Self>) -> Option<Self> {
        merge_struct(local, global, |l, g| Self {
            api_key: l.api_key.clone().or_else(|| g.api_key.clone()),
            escalation_policy: l.escalation_policy.clone().or_else(|| g.escalation_policy.clone()),
            from: l.from.clone().or_else(|| g.from.clone()),
            routing_key: l.routing_key.clone().or_else(|| g.routing_key.clone()),
            urgency: l.urgency.clone().or_else(|| g.urgency.clone()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlackConfig {
    pub api_token: String,
    pub channel_id: String,
    pub username: Option<String>,
    pub image_uri: Option<String>,
}

impl SlackConfig {
    fn merge(local: Option<&Self>, global: Option<&Self>) -> Option<Self> {
        merge_struct(local, global, |l, g| Self {
            api_token: if l.api_token.is_empty() { g.api_token.clone() } else { l.api_token.clone() },
            channel_id: if l.channel_id.is_empty() { g.channel_id.clone() } else { l.channel_id.clone() },
            username: l.username.clone().or_else(|| g.username.clone()),
            image_uri: l.image_uri.clone().or_else(|| g.image_uri.clone()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthChecksIoConfig {
    pub api_key: String,
}

impl HealthChecksIoConfig {
    fn merge(local: Option<&Self>, global: Option<&Self>) -> Option<Self> {
        merge_struct(local, global, |l, g| Self {
            api_key: if l.api_key.is_empty() { g.api_key.clone() } else { l.api_key.clone() },
        })
    }
}

/// `local` wins wholesale when set; when both are set, `combine` merges
/// field-by-field (local wins per field too).
fn merge_struct<T: Clone>(local: Option<&T>, global: Option<&T>, combine: impl FnOnce(&T, &T) -> T) -> Option<T> {
    match (local, global) {
        (None, None) => None,
        (Some(l), None) => Some(l.clone()),
        (None, Some(g)) => Some(g.clone()),
        (Some(l), Some(g)) => Some(combine(l, g)),
    }
}

// ---------------------------------------------------------------------
// Environment-variable overrides (`spec.md` §6). Only applied when every
// field in the "required" subset is present — a partial set is ignored,
// exactly like `config.ReadPagerDutyFromEnv` / `ReadSlackFromEnv`.
// ---------------------------------------------------------------------

fn apply_env_overrides(alert: &mut Alert) {
    if let Some(pd) = pagerduty_from_env() {
        alert.pagerduty = Some(pd);
    }
    if let Some(slack) = slack_from_env() {
        alert.slack = Some(slack);
    }
    if let Some(hc) = healthchecksio_from_env() {
        alert.healthchecksio = Some(hc);
    }
}

fn pagerduty_from_env() -> Option<PagerDutyConfig> {
    let api_key = std::env::var("DEADCHECK_PAGERDUTY_API_KEY").ok()?.trim().to_string();
    let escalation_policy = std::env::var("DEADCHECK_PAGERDUTY_ESCALATION_POLICY").ok()?;
    let from = std::env::var("DEADCHECK_PAGERDUTY_FROM").ok()?;
    if api_key.is_empty() || escalation_policy.is_empty() || from.is_empty() {
        return None;
    }
    Some(PagerDutyConfig {
        api_key: Some(api_key),
        escalation_policy: Some(escalation_policy),
        from: Some(from),
        routing_key: std::env::var("DEADCHECK_PAGERDUTY_ROUTING_KEY").ok(),
        urgency: None,
    })
}

fn slack_from_env() -> Option<SlackConfig> {
    let api_token = std::env::var("DEADCHECK_SLACK_API_TOKEN").ok()?;
    let channel_id = std::env::var("DEADCHECK_SLACK_CHANNEL_ID").ok()?;
    if api_token.is_empty() || channel_id.is_empty() {
        return None;
    }
    Some(SlackConfig {
        api_token,
        channel_id,
        username: std::env::var("DEADCHECK_SLACK_USERNAME").ok(),
        image_uri: std::env::var("DEADCHECK_SLACK_IMAGE_URI").ok(),
    })
}

fn healthchecksio_from_env() -> Option<HealthChecksIoConfig> {
    let api_key = std::env::var("DEADCHECK_HEALTHCHECKSIO_API_KEY").ok()?;
    if api_key.is_empty() {
        return None;
    }
    Some(HealthChecksIoConfig { api_key })
}

// ---------------------------------------------------------------------
// Raw (serde) shapes, 1:1 with the YAML file.
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    checks: Vec<RawCheck>,
    #[serde(default)]
    alert: RawAlert,
    #[serde(default)]
    server: RawServer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServer {
    #[serde(rename = "bindAddress", default)]
    bind_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCheck {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    schedule: RawSchedule,
    #[serde(default)]
    alert: RawAlert,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchedule {
    every: Option<RawEvery>,
    weekdays: Option<RawPartialDay>,
    #[serde(rename = "bankingDays")]
    banking_days: Option<RawPartialDay>,
}

impl RawSchedule {
    fn into_schedule(self, id: &str) -> Result<Schedule, ConfigError> {
        let set_count =
            [self.every.is_some(), self.weekdays.is_some(), self.banking_days.is_some()]
                .into_iter()
                .filter(|set| *set)
                .count();
        if set_count > 1 {
            return Err(ConfigError::AmbiguousSchedule { id: id.to_string() });
        }
        if let Some(every) = self.every {
            return every.into_schedule(id);
        }
        if let Some(weekdays) = self.weekdays {
            return weekdays.into_schedule(id, false);
        }
        if let Some(banking_days) = self.banking_days {
            return banking_days.into_schedule(id, true);
        }
        Err(ConfigError::NoSchedule { id: id.to_string() })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvery {
    interval: String,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

impl RawEvery {
    fn into_schedule(self, id: &str) -> Result<Schedule, ConfigError> {
        let interval = parse_duration(id, "every.interval", &self.interval)?;
        let start = self
            .start
            .as_deref()
            .map(|s| parse_time_of_day(id, "every.start", s))
            .transpose()?;
        let end = self
            .end
            .as_deref()
            .map(|s| parse_time_of_day(id, "every.end", s))
            .transpose()?;
        if let (Some(s), Some(e)) = (start, end)
            && s >= e
        {
            return Err(ConfigError::StartNotBeforeEnd {
                id: id.to_string(),
                start: s.to_string(),
                end: e.to_string(),
            });
        }
        Ok(Schedule::Every { interval, start, end })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPartialDay {
    timezone: String,
    times: Vec<String>,
    #[serde(default)]
    tolerance: Option<String>,
}

impl RawPartialDay {
    fn into_schedule(self, id: &str, banking: bool) -> Result<Schedule, ConfigError> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|source| ConfigError::BadTimezone {
                id: id.to_string(),
                tz: self.timezone.clone(),
                source,
            })?;

        let mut times: Vec<TimeOfDay> = self
            .times
            .iter()
            .map(|t| parse_time_of_day(id, "times", t))
            .collect::<Result<_, _>>()?;
        times.sort();
        times.dedup();

        let tolerance = match self.tolerance {
            Some(t) => parse_duration(id, "tolerance", &t)?,
            None => Duration::zero(),
        };

        if banking {
            Ok(Schedule::BankingDays { timezone, times, tolerance })
        } else {
            Ok(Schedule::Weekdays { timezone, times, tolerance })
        }
    }
}

fn parse_duration(id: &str, field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let std_dur = humantime::parse_duration(value).map_err(|source| ConfigError::BadDuration {
        id: id.to_string(),
        field,
        value: value.to_string(),
        source,
    })?;
    Ok(Duration::from_std(std_dur).unwrap_or_else(|_| Duration::max_value()))
}

fn parse_time_of_day(id: &str, field: &'static str, value: &str) -> Result<TimeOfDay, ConfigError> {
    TimeOfDay::parse_hhmm(value).map_err(|source| ConfigError::BadTimeOfDay {
        id: id.to_string(),
        field,
        value: value.to_string(),
        source,
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAlert {
    pagerduty: Option<RawPagerDuty>,
    slack: Option<RawSlack>,
    healthchecksio: Option<RawHealthChecksIo>,
    mock: Option<RawMock>,
}

impl RawAlert {
    fn into_alert(self) -> Alert {
        Alert {
            pagerduty: self.pagerduty.map(RawPagerDuty::into_config),
            slack: self.slack.map(RawSlack::into_config),
            healthchecksio: self.healthchecksio.map(RawHealthChecksIo::into_config),
            mock: self.mock.map(|_| MockConfig {}),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPagerDuty {
    #[serde(rename = "apiKey", default)]
    api_key: Option<String>,
    #[serde(rename = "escalationPolicy", default)]
    escalation_policy: Option<String>,
    #[serde(default)]
    from: Option<String>,
    #[serde(rename = "routingKey", default)]
    routing_key: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
}

impl RawPagerDuty {
    fn into_config(self) -> PagerDutyConfig {
        PagerDutyConfig {
            api_key: self.api_key,
            escalation_policy: self.escalation_policy,
            from: self.from,
            routing_key: self.routing_key,
            urgency: self.urgency,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSlack {
    #[serde(rename = "apiToken", default)]
    api_token: Option<String>,
    #[serde(rename = "channelId", default)]
    channel_id: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(rename = "imageUri", default)]
    image_uri: Option<String>,
}

impl RawSlack {
    fn into_config(self) -> SlackConfig {
        SlackConfig {
            api_token: self.api_token.unwrap_or_default(),
            channel_id: self.channel_id.unwrap_or_default(),
            username: self.username,
            image_uri: self.image_uri,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHealthChecksIo {
    #[serde(rename = "apiKey", default)]
    api_key: Option<String>,
}

impl RawHealthChecksIo {
    fn into_config(self) -> HealthChecksIoConfig {
        HealthChecksIoConfig {
            api_key: self.api_key.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMock {}

impl Check {
    fn from_raw(raw: RawCheck) -> Result<Self, ConfigError> {
        let schedule = raw.schedule.into_schedule(&raw.id)?;
        Ok(Check {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            schedule,
            alert: raw.alert.into_alert(),
        })
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, ConfigError> {
        let mut seen = HashSet::with_capacity(raw.checks.len());
        let mut checks = Vec::with_capacity(raw.checks.len());
        for raw_check in raw.checks {
            if !seen.insert(raw_check.id.clone()) {
                return Err(ConfigError::DuplicateId(raw_check.id));
            }
            checks.push(Check::from_raw(raw_check)?);
        }
        Ok(Config {
            checks,
            alert: raw.alert.into_alert(),
            server: ServerConfig {
                bind_address: raw.server.bind_address,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC_YAML: &str = r#"
checks:
  - id: nightly-backup
    name: Nightly Backup
    schedule:
      every:
        interval: 24h
    alert:
      mock: {}
"#;

    #[test]
    fn parses_minimal_config() {
        let config = parse(BASIC_YAML).unwrap();
        assert_eq!(config.checks.len(), 1);
        assert_eq!(config.checks[0].id, "nightly-backup");
        assert!(matches!(config.checks[0].schedule, Schedule::Every { .. }));
    }

    #[test]
    fn load_reads_and_parses_a_config_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BASIC_YAML.as_bytes()).unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.checks.len(), 1);
        assert_eq!(config.checks[0].id, "nightly-backup");
    }

    #[test]
    fn load_surfaces_io_errors_for_a_missing_file() {
        let err = load(Path::new("/no/such/deadcheck-config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn rejects_schedule_with_no_variant_set() {
        let yaml = r#"
checks:
  - id: bad
    name: Bad
    schedule: {}
    alert:
      mock: {}
"#;
        let err = parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::NoSchedule { .. }));
    }

    #[test]
    fn rejects_schedule_with_two_variants_set() {
        let yaml = r#"
checks:
  - id: bad
    name: Bad
    schedule:
      every:
        interval: 1h
      weekdays:
        timezone: UTC
        times: ["09:00"]
    alert:
      mock: {}
"#;
        let err = parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::AmbiguousSchedule { .. }));
    }

    #[test]
    fn rejects_check_with_no_provider_configured() {
        let yaml = r#"
checks:
  - id: bad
    name: Bad
    schedule:
      every:
        interval: 1h
"#;
        let err = parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::NoProvider { .. }));
    }

    #[test]
    fn weekday_times_are_sorted_and_deduped() {
        let yaml = r#"
checks:
  - id: reports
    name: Reports
    schedule:
      weekdays:
        timezone: America/New_York
        times: ["15:00", "09:00", "09:00", "12:00"]
        tolerance: 5m
    alert:
      mock: {}
"#;
        let config = parse(yaml).unwrap();
        match &config.checks[0].schedule {
            Schedule::Weekdays { times, .. } => {
                assert_eq!(
                    times.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
                    vec!["09:00", "12:00", "15:00"]
                );
            }
            _ => panic!("expected Weekdays schedule"),
        }
    }

    #[test]
    fn local_alert_wins_over_global_per_field() {
        let local = Alert {
            pagerduty: Some(PagerDutyConfig {
                api_key: Some("local-key".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let global = Alert {
            pagerduty: Some(PagerDutyConfig {
                api_key: Some("global-key".into()),
                escalation_policy: Some("global-policy".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = Alert::merge(&local, &global).pagerduty.unwrap();
        assert_eq!(merged.api_key.as_deref(), Some("local-key"));
        assert_eq!(merged.escalation_policy.as_deref(), Some("global-policy"));
    }

    #[test]
    fn env_override_requires_full_required_subset() {
        // Env vars are process-global; scope this test to vars it owns and clean up after.
        unsafe {
            std::env::remove_var("DEADCHECK_PAGERDUTY_API_KEY");
            std::env::set_var("DEADCHECK_PAGERDUTY_ESCALATION_POLICY", "P123");
        }
        assert!(pagerduty_from_env().is_none());
        unsafe {
            std::env::remove_var("DEADCHECK_PAGERDUTY_ESCALATION_POLICY");
        }
    }
}
