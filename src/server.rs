//! The HTTP surface (`spec.md` §6): a single `POST|PUT /checks/{id}/check-in`
//! route, plus `tower_http` timeout/trace layers the way the teacher's
//! `server::build_router` layers its own routes.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter};
use axum::Json;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::error::CheckError;
use crate::registry::Registry;

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub cancel: CancellationToken,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/checks/{id}/check-in", on(MethodFilter::POST.or(MethodFilter::PUT), check_in_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}

#[derive(Serialize)]
struct CheckInResponse {
    #[serde(rename = "nextExpectedCheckIn")]
    next_expected_check_in: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

async fn check_in_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if !state.registry.contains(&id) {
        return error_response(StatusCode::NOT_FOUND, format!("check {id:?} not found"));
    }

    match state.registry.check_in(&id, &state.cancel).await {
        Ok(next_expected) => (
            StatusCode::OK,
            Json(CheckInResponse { next_expected_check_in: next_expected.to_rfc3339() }),
        )
            .into_response(),
        Err(err) => {
            let status = match StatusCode::from_u16(err.status_code()) {
                Ok(status) => status,
                Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            if status.is_server_error() {
                warn!(check_id = %id, error = %err, "check-in failed");
            }
            error_response(status, err.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

// Exhaustiveness check for `CheckError::status_code`'s callers: every
// variant must map to a definite HTTP status, not just the ones this
// handler happens to exercise in tests.
const _: fn(&CheckError) -> u16 = CheckError::status_code;

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use tower::ServiceExt;

    use crate::config::{Alert, Check, Config, Schedule, ServerConfig};
    use crate::time_source::StaticClock;

    async fn test_state(now: chrono::DateTime<Utc>) -> AppState {
        let config = Config {
            checks: vec![Check {
                id: "nightly-backup".to_string(),
                name: "nightly backup".to_string(),
                description: None,
                schedule: Schedule::Every { interval: chrono::Duration::minutes(30), start: None, end: None },
                alert: Alert { mock: Some(Default::default()), ..Default::default() },
            }],
            alert: Alert::default(),
            server: ServerConfig::default(),
        };
        let clock = Arc::new(StaticClock(now));
        let registry = Arc::new(Registry::setup(&config, clock).await.unwrap());
        AppState { registry, cancel: CancellationToken::new() }
    }

    #[tokio::test]
    async fn check_in_on_known_check_returns_200_with_next_expected() {
        let now = Utc.with_ymd_and_hms(2024, 10, 7, 13, 0, 0).unwrap();
        let state = test_state(now).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().method("POST").uri("/checks/nightly-backup/check-in").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn check_in_on_unknown_check_returns_404() {
        let now = Utc.with_ymd_and_hms(2024, 10, 7, 13, 0, 0).unwrap();
        let state = test_state(now).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().method("PUT").uri("/checks/does-not-exist/check-in").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
