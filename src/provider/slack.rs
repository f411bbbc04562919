//! Slack adapter: schedules a future "did not check-in" message and
//! replaces it (delete + recreate) on every check-in, since Slack has no
//! in-place way to push a scheduled message's send time out. Grounded on
//! `internal/provider/slack/client.go`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::Check;
use crate::config::SlackConfig;
use crate::error::ProviderError;
use crate::snooze;

const BASE_URL: &str = "https://slack.com/api";
const PROVIDER: &str = "slack";

#[derive(Debug)]
pub struct Client {
    http: reqwest::Client,
    config: SlackConfig,
}

impl Client {
    pub fn new(config: &SlackConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Ok(Self { http, config: config.clone() })
    }

    pub async fn setup(&self, check: &Check, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        if let Some(existing) = self.find_scheduled_message(check).await? {
            return Ok(existing.post_at_instant());
        }
        let (scheduled, wait) = snooze::calculate(now, &check.schedule)
            .map_err(|err| ProviderError::Api { provider: PROVIDER, status: 0, message: err.to_string() })?;
        let next_expected = scheduled.with_timezone(&Utc) + wait;
        self.schedule_message(check, next_expected).await?;
        Ok(next_expected)
    }

    pub async fn check_in(&self, check: &Check, next_expected: DateTime<Utc>, _now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        if let Some(existing) = self.find_scheduled_message(check).await? {
            self.delete_scheduled_message(&existing.id).await?;
        }
        self.schedule_message(check, next_expected).await?;
        Ok(next_expected)
    }

    async fn find_scheduled_message(&self, check: &Check) -> Result<Option<ScheduledMessage>, ProviderError> {
        #[derive(Deserialize)]
        struct ListResponse {
            #[serde(default)]
            scheduled_messages: Vec<ScheduledMessage>,
        }

        let resp: ListResponse = self
            .get("chat.scheduledMessages.list", &[("channel", self.config.channel_id.as_str()), ("limit", "20")])
            .await?;

        Ok(resp
            .scheduled_messages
            .into_iter()
            .find(|msg| msg.text.contains(&check.id) && msg.text.contains("check-in")))
    }

    async fn schedule_message(&self, check: &Check, next_expected: DateTime<Utc>) -> Result<(), ProviderError> {
        let text = format!(
            "{} did not check-in, expected check-in at {}",
            check.id,
            next_expected.to_rfc3339(),
        );
        let body = json!({
            "channel": self.config.channel_id,
            "post_at": next_expected.timestamp(),
            "text": text,
            "username": self.config.username.clone().unwrap_or_else(|| "deadcheck".to_string()),
            "icon_url": self.config.image_uri,
        });
        let _: ApiAck = self.post("chat.scheduleMessage", &body).await?;
        Ok(())
    }

    async fn delete_scheduled_message(&self, scheduled_message_id: &str) -> Result<(), ProviderError> {
        let body = json!({
            "channel": self.config.channel_id,
            "scheduled_message_id": scheduled_message_id,
            "as_user": true,
        });
        match self.post::<ApiAck>("chat.deleteScheduledMessage", &body).await {
            Ok(_) => Ok(()),
            Err(ProviderError::Api { message, .. }) if message.contains("invalid_scheduled_message_id") => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> Result<T, ProviderError> {
        let resp = self
            .http
            .get(format!("{BASE_URL}/{method}"))
            .bearer_auth(&self.config.api_token)
            .query(query)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Self::decode(resp).await
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, method: &str, body: &serde_json::Value) -> Result<T, ProviderError> {
        let resp = self
            .http
            .post(format!("{BASE_URL}/{method}"))
            .bearer_auth(&self.config.api_token)
            .json(body)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        Self::decode(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ProviderError> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api { provider: PROVIDER, status: status.as_u16(), message: text });
        }
        let envelope: SlackEnvelope<T> = resp
            .json()
            .await
            .map_err(|source| ProviderError::Http { provider: PROVIDER, source })?;
        if !envelope.ok {
            return Err(ProviderError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: envelope.error.unwrap_or_else(|| "unknown slack error".to_string()),
            });
        }
        Ok(envelope.into_inner())
    }
}

#[derive(Debug, Deserialize)]
struct ScheduledMessage {
    id: String,
    #[serde(default)]
    text: String,
    post_at: i64,
}

impl ScheduledMessage {
    fn post_at_instant(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.post_at, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Deserialize)]
struct ApiAck {}

/// Slack's API always answers with a top-level `ok` boolean alongside the
/// method-specific payload, flattened into the same JSON object.
#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    inner: Option<T>,
}

impl<T> SlackEnvelope<T> {
    fn into_inner(self) -> T {
        self.inner.expect("ok response without a payload")
    }
}
