//! healthchecks.io adapter: a check with a cron-formatted expected time and
//! a grace period equal to the schedule's tolerance (minimum 60s); a
//! check-in is a success ping. Grounded on
//! `internal/provider/healthchecksio/healthchecksio.go`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::Check;
use crate::config::HealthChecksIoConfig;
use crate::crontab;
use crate::error::ProviderError;
use crate::snooze;

const BASE_URL: &str = "https://healthchecks.io/api/v3";
const PROVIDER: &str = "healthchecksio";

#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    config: HealthChecksIoConfig,
}

impl Client {
    pub fn new(config: &HealthChecksIoConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Ok(Self { http, config: config.clone() })
    }

    pub async fn setup(&self, check: &Check, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        let remote = self.find_or_create_check(check, now).await?;
        let next_expected = remote
            .next_ping_instant()
            .ok_or_else(|| ProviderError::Api { provider: PROVIDER, status: 0, message: "check has no schedule".into() })?;
        Ok(next_expected)
    }

    pub async fn check_in(&self, check: &Check, next_expected: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        let remote = self.find_or_create_check(check, now).await?;
        self.ping(&remote.ping_url).await?;
        self.update_schedule(&remote.uuid, check, next_expected).await?;
        Ok(next_expected)
    }

    async fn find_or_create_check(&self, check: &Check, now: DateTime<Utc>) -> Result<RemoteCheck, ProviderError> {
        #[derive(Deserialize)]
        struct ListResponse {
            checks: Vec<RemoteCheck>,
        }

        let resp: ListResponse = self
            .get(&format!("{BASE_URL}/checks/"), &[("tag", check.id.as_str())])
            .await?;
        if let Some(existing) = resp.checks.into_iter().find(|c| c.name == check.name) {
            return Ok(existing);
        }

        let (scheduled, wait) = snooze::calculate(now, &check.schedule)
            .map_err(|err| ProviderError::Api { provider: PROVIDER, status: 0, message: err.to_string() })?;
        let next_expected = scheduled.with_timezone(&Utc) + wait;
        let tz = scheduled.timezone();

        let grace = check.schedule.tolerance().num_seconds().max(60);
        let body = json!({
            "name": check.name,
            "slug": check.id,
            "tags": check.id,
            "unique": ["slug"],
            "desc": check.description.clone().unwrap_or_default(),
            "timezone": tz.name(),
            "schedule": crontab::format_time(next_expected.with_timezone(&tz)),
            "grace": grace,
        });

        self.post(&format!("{BASE_URL}/checks/"), &body).await
    }

    async fn update_schedule(&self, uuid: &str, check: &Check, next_expected: DateTime<Utc>) -> Result<(), ProviderError> {
        let tz = match &check.schedule {
            crate::config::Schedule::Weekdays { timezone, .. } | crate::config::Schedule::BankingDays { timezone, .. } => *timezone,
            crate::config::Schedule::Every { .. } => chrono_tz::UTC,
        };
        let grace = check.schedule.tolerance().num_seconds().max(60);
        let body = json!({
            "schedule": crontab::format_time(next_expected.with_timezone(&tz)),
            "tz": tz.name(),
            "grace": grace,
        });
        let _: RemoteCheck = self.post(&format!("{BASE_URL}/checks/{uuid}"), &body).await?;
        Ok(())
    }

    async fn ping(&self, ping_url: &str) -> Result<(), ProviderError> {
        self.http
            .get(ping_url)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?
            .error_for_status()
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Ok(())
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, ProviderError> {
        let resp = self
            .http
            .get(url)
            .header("X-Api-Key", &self.config.api_key)
            .query(query)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Self::decode(resp).await
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> Result<T, ProviderError> {
        let resp = self
            .http
            .post(url)
            .header("X-Api-Key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Self::decode(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { provider: PROVIDER, status: status.as_u16(), message });
        }
        resp.json::<T>().await.map_err(|source| ProviderError::Http { provider: PROVIDER, source })
    }
}

#[derive(Debug, Deserialize)]
struct RemoteCheck {
    uuid: String,
    name: String,
    ping_url: String,
    #[serde(default)]
    next_ping: Option<DateTime<Utc>>,
}

impl RemoteCheck {
    fn next_ping_instant(&self) -> Option<DateTime<Utc>> {
        self.next_ping
    }
}
