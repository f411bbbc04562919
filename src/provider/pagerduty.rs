//! PagerDuty adapter: arms (and extends) an ongoing low-urgency incident on
//! a service named after the check. Grounded on
//! `internal/provider/pd/{service,incidents,snooze}.go`, reimplemented
//! directly against the PagerDuty REST API with `reqwest` rather than
//! pulling in a dedicated PagerDuty SDK crate, consistent with this
//! adapter family's ambient HTTP stack.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::config::PagerDutyConfig;
use crate::config::Check;
use crate::error::ProviderError;
use crate::snooze;

const BASE_URL: &str = "https://api.pagerduty.com";
const PROVIDER: &str = "pagerduty";

#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    config: PagerDutyConfig,
}

impl Client {
    pub fn new(config: &PagerDutyConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.as_deref().unwrap_or_default();
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Token token={api_key}"))
                .map_err(|_| ProviderError::Api { provider: PROVIDER, status: 0, message: "invalid api key".into() })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/vnd.pagerduty+json;version=2"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;

        Ok(Self { http, config: config.clone() })
    }

    pub async fn setup(&self, check: &Check, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        let service = self.find_or_create_service(check).await?;
        let incident = self.find_or_create_incident(check, &service.id).await?;

        let (scheduled, wait) = snooze::calculate(now, &check.schedule)
            .map_err(|err| ProviderError::Api { provider: PROVIDER, status: 0, message: err.to_string() })?;
        let next_expected = scheduled.with_timezone(&Utc) + wait;

        self.snooze_incident(&incident.id, &service.summary, next_expected, now).await?;
        Ok(next_expected)
    }

    pub async fn check_in(&self, check: &Check, next_expected: DateTime<Utc>, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        let service = self.find_or_create_service(check).await?;
        let incident = self.find_or_create_incident(check, &service.id).await?;
        self.snooze_incident(&incident.id, &service.summary, next_expected, now).await?;
        Ok(next_expected)
    }

    async fn find_or_create_service(&self, check: &Check) -> Result<PdService, ProviderError> {
        #[derive(Deserialize)]
        struct ListServicesResponse {
            services: Vec<PdService>,
        }

        let resp: ListServicesResponse = self
            .get(&format!("{BASE_URL}/services"), &[("query", check.name.as_str()), ("limit", "100")])
            .await?;
        if let Some(existing) = resp.services.into_iter().find(|s| s.name == check.name) {
            return Ok(existing);
        }

        #[derive(Deserialize)]
        struct CreateServiceResponse {
            service: PdService,
        }

        let mut service = json!({
            "name": check.name,
            "description": check.description.clone().unwrap_or_default(),
        });
        if let Some(policy) = &self.config.escalation_policy {
            service["escalation_policy"] = json!({ "id": policy, "type": "escalation_policy_reference" });
        }

        let created: CreateServiceResponse =
            self.post(&format!("{BASE_URL}/services"), &json!({ "service": service })).await?;
        Ok(created.service)
    }

    async fn find_or_create_incident(&self, check: &Check, service_id: &str) -> Result<PdIncident, ProviderError> {
        #[derive(Deserialize)]
        struct ListIncidentsResponse {
            incidents: Vec<PdIncident>,
        }

        let resp: ListIncidentsResponse = self
            .get(
                &format!("{BASE_URL}/incidents"),
                &[("service_ids[]", service_id), ("statuses[]", "triggered"), ("statuses[]", "acknowledged")],
            )
            .await?;
        if let Some(existing) = resp.incidents.into_iter().find(|inc| inc.body.details.contains("check-in")) {
            return Ok(existing);
        }

        #[derive(Deserialize)]
        struct CreateIncidentResponse {
            incident: PdIncident,
        }

        let body = json!({
            "incident": {
                "type": "incident",
                "title": format!("Creating ongoing incident for {}", check.name),
                "body": {
                    "type": "incident_body",
                    "details": "This incident is used by deadcheck to alert on missed check-ins.",
                },
                "urgency": self.config.urgency.clone().unwrap_or_else(|| "low".to_string()),
                "escalation_policy": { "id": self.config.escalation_policy, "type": "escalation_policy_reference" },
                "service": { "id": service_id, "type": "service_reference" },
            }
        });

        let created: CreateIncidentResponse = self.post(&format!("{BASE_URL}/incidents"), &body).await?;
        Ok(created.incident)
    }

    async fn snooze_incident(
        &self,
        incident_id: &str,
        service_name: &str,
        next_expected: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ProviderError> {
        let seconds = (next_expected - now).num_seconds().max(0);
        let _: serde_json::Value = self
            .put(
                &format!("{BASE_URL}/incidents/{incident_id}/snooze"),
                &json!({ "duration": seconds }),
            )
            .await?;

        let title = format!(
            "{} did not check-in, expected check-in at {}",
            service_name,
            next_expected.format("%Y-%m-%d %H:%M UTC"),
        );
        let _: serde_json::Value = self
            .put(
                &format!("{BASE_URL}/incidents/{incident_id}"),
                &json!({ "incident": { "type": "incident_reference", "title": title } }),
            )
            .await?;
        Ok(())
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, ProviderError> {
        let resp = self
            .http
            .get(url)
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
            .json(body)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Self::decode(resp).await
    }

    async fn put<T: serde::de::DeserializeOwned>(&self, url: &str, body: &serde_json::Value) -> Result<T, ProviderError> {
        let resp = self
            .http
            .put(url)
            .header(AUTHORIZATION, format!("Token token={}", self.config.api_key.clone().unwrap_or_default()))
            .header("From", self.config.from.clone().unwrap_or_default())
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
struct PdService {
    id: String,
    name: String,
    summary: String,
}

#[derive(Debug, Deserialize)]
struct PdIncident {
    id: String,
    summary: String,
    body: PdIncidentBody,
}

/// Deserialized separately because `details` (unlike `summary`, which is
/// server-derived from the incident's title) is set once, permanently, at
/// creation — the only field safe to use as a "did deadcheck already create
/// this" marker across a restart between creation and the later title
/// rewrite in `snooze_incident`.
#[derive(Debug, Deserialize)]
struct PdIncidentBody {
    details: String,
}
