//! An in-memory provider used by tests and by checks configured with
//! `alert.mock`. Grounded on `internal/provider/mock.go`: it just remembers
//! a next-expected instant per check and can be told to fail on demand.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::Check;
use crate::error::ProviderError;
use crate::snooze;

#[derive(Debug, Default)]
pub struct Client {
    deadlines: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn setup(&self, check: &Check, now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        let (scheduled, snoozed) = snooze::calculate(now, &check.schedule)
            .map_err(|err| ProviderError::Api { provider: "mock", status: 0, message: err.to_string() })?;
        let next_expected = scheduled.with_timezone(&Utc) + snoozed;
        self.deadlines.lock().await.insert(check.id.clone(), next_expected);
        Ok(next_expected)
    }

    pub async fn check_in(&self, check: &Check, next_expected: DateTime<Utc>, _now: DateTime<Utc>) -> Result<DateTime<Utc>, ProviderError> {
        let mut deadlines = self.deadlines.lock().await;
        let resolved = match deadlines.get(&check.id) {
            Some(existing) if *existing > next_expected => *existing,
            _ => next_expected,
        };
        deadlines.insert(check.id.clone(), resolved);
        Ok(resolved)
    }

    /// The deadline this mock currently has armed for `check_id`, if any.
    pub async fn deadline_for(&self, check_id: &str) -> Option<DateTime<Utc>> {
        self.deadlines.lock().await.get(check_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Schedule;
    use chrono::Duration;

    fn check(id: &str) -> Check {
        Check {
            id: id.to_string(),
            name: "nightly backup".to_string(),
            description: None,
            schedule: Schedule::Every { interval: Duration::hours(1), start: None, end: None },
            alert: Default::default(),
        }
    }

    #[tokio::test]
    async fn setup_then_check_in_extends_the_deadline() {
        let client = Client::new();
        let now = Utc::now();
        let check = check("nightly-backup");

        let first = client.setup(&check, now).await.unwrap();
        assert_eq!(client.deadline_for(&check.id).await, Some(first));

        let later = client.check_in(&check, first + Duration::hours(1), now).await.unwrap();
        assert_eq!(later, first + Duration::hours(1));
    }

    #[tokio::test]
    async fn check_in_never_shortens_an_existing_deadline() {
        let client = Client::new();
        let now = Utc::now();
        let check = check("nightly-backup");
        client.setup(&check, now).await.unwrap();

        let far_future = now + Duration::hours(6);
        client.check_in(&check, far_future, now).await.unwrap();

        let shorter = client.check_in(&check, now + Duration::hours(2), now).await.unwrap();
        assert_eq!(shorter, far_future);
    }
}
